//! Embedded HTML/CSS/JS frontend for the cellscope web dashboard.
//!
//! The entire SPA is compiled into the binary as a string constant. The
//! only external asset is Chart.js, loaded from a CDN. Chart configs arrive
//! ready-made from `/api/page`; the page only installs tooltip callbacks.

/// The complete single-page dashboard HTML.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>cellscope</title>
<script src="https://cdn.jsdelivr.net/npm/chart.js@4.4.1/dist/chart.umd.min.js"></script>
<style>
:root {
  --bg: #0d1117;
  --surface: #161b22;
  --border: #30363d;
  --text: #e6edf3;
  --text-muted: #8b949e;
  --accent: #4a6fa5;
  --green: #3fb950;
  --yellow: #d29922;
  --red: #f85149;
  --radius: 8px;
  --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
  --mono: 'SF Mono', 'Cascadia Code', 'Fira Code', monospace;
}

* { margin: 0; padding: 0; box-sizing: border-box; }
body {
  background: var(--bg);
  color: var(--text);
  font-family: var(--font);
  font-size: 14px;
  line-height: 1.5;
}

.app { max-width: 1200px; margin: 0 auto; padding: 24px; }
.hidden { display: none !important; }

header {
  display: flex;
  align-items: center;
  justify-content: space-between;
  margin-bottom: 24px;
  padding-bottom: 16px;
  border-bottom: 1px solid var(--border);
}
header h1 { font-size: 24px; font-weight: 600; }
header h1 .logo { color: var(--accent); font-family: var(--mono); font-weight: 700; }
header .subtitle { color: var(--text-muted); font-size: 13px; }

.badge {
  display: inline-flex;
  align-items: center;
  gap: 4px;
  padding: 4px 10px;
  border-radius: 12px;
  font-size: 12px;
  background: var(--surface);
  border: 1px solid var(--border);
}
.badge.ok { border-color: var(--green); color: var(--green); }
.badge.err { border-color: var(--red); color: var(--red); }

.card {
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: 20px;
  margin-bottom: 16px;
}
.card h2 { font-size: 16px; font-weight: 600; margin-bottom: 16px; }
.card h3 { font-size: 14px; font-weight: 600; margin-bottom: 12px; color: var(--text-muted); }

.stats-grid {
  display: grid;
  grid-template-columns: repeat(auto-fit, minmax(160px, 1fr));
  gap: 16px;
  margin-bottom: 16px;
}
.stat-card {
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: 20px;
  text-align: center;
}
.stat-card .value { font-size: 28px; font-weight: 700; font-family: var(--mono); color: var(--accent); }
.stat-card .label {
  font-size: 12px;
  color: var(--text-muted);
  margin-top: 6px;
  text-transform: uppercase;
  letter-spacing: 0.5px;
}

.charts-grid {
  display: grid;
  grid-template-columns: repeat(auto-fit, minmax(480px, 1fr));
  gap: 16px;
}

/* Upload */
.drop-area {
  border: 2px dashed var(--border);
  border-radius: var(--radius);
  padding: 40px;
  text-align: center;
  color: var(--text-muted);
  cursor: pointer;
  transition: all 0.15s;
}
.drop-area.active { border-color: var(--accent); background: rgba(74,111,165,0.08); color: var(--text); }
.preview { margin-top: 16px; max-width: 100%; max-height: 360px; border-radius: 6px; }

button.primary {
  margin-top: 16px;
  padding: 8px 20px;
  border: none;
  border-radius: 6px;
  background: var(--accent);
  color: #fff;
  font-size: 13px;
  font-weight: 500;
  cursor: pointer;
}
button.primary:disabled { opacity: 0.4; cursor: not-allowed; }

.result-media { max-width: 100%; border-radius: 6px; }

table { width: 100%; border-collapse: collapse; font-size: 13px; }
th, td { text-align: left; padding: 8px 12px; border-bottom: 1px solid var(--border); }
th { color: var(--text-muted); font-weight: 500; font-size: 12px; text-transform: uppercase; }
td.mono { font-family: var(--mono); font-size: 12px; }
td.info { color: var(--text-muted); font-style: italic; }

.loading {
  position: fixed;
  inset: 0;
  background: rgba(13,17,23,0.8);
  display: flex;
  flex-direction: column;
  align-items: center;
  justify-content: center;
  gap: 16px;
  z-index: 10;
}
.spinner {
  width: 40px;
  height: 40px;
  border: 4px solid var(--border);
  border-top-color: var(--accent);
  border-radius: 50%;
  animation: spin 1s linear infinite;
}
@keyframes spin { to { transform: rotate(360deg); } }

.toast {
  position: fixed;
  bottom: 24px;
  right: 24px;
  padding: 10px 16px;
  border-radius: 6px;
  background: var(--surface);
  border: 1px solid var(--green);
  opacity: 0;
  transition: opacity 0.2s;
}
.toast.show { opacity: 1; }
.toast.error { border-color: var(--red); }
</style>
</head>
<body>
<div class="app">
  <header>
    <div>
      <h1><span class="logo">cellscope</span> blood cell detection</h1>
      <div class="subtitle" id="model-key"></div>
    </div>
    <div id="health-badges"></div>
  </header>

  <section id="performance" class="hidden">
    <div class="stats-grid">
      <div class="stat-card"><div class="value" data-field="map">-</div><div class="label">mAP@0.5:0.95</div></div>
      <div class="stat-card"><div class="value" data-field="map50">-</div><div class="label">mAP@0.5</div></div>
      <div class="stat-card"><div class="value" data-field="precision">-</div><div class="label">Precision</div></div>
      <div class="stat-card"><div class="value" data-field="recall">-</div><div class="label">Recall</div></div>
      <div class="stat-card"><div class="value" data-field="f1">-</div><div class="label">F1</div></div>
    </div>
    <div class="charts-grid">
      <div class="card"><h3>Precision and recall by class</h3><canvas id="precision_recall"></canvas></div>
      <div class="card"><h3>mAP by IoU threshold</h3><canvas id="map_by_iou"></canvas></div>
      <div class="card"><h3>Learning curve</h3><canvas id="learning_curve"></canvas></div>
      <div class="card"><h3>mAP by epoch</h3><canvas id="map_by_epoch"></canvas></div>
      <div class="card"><canvas id="confusion_matrix"></canvas></div>
    </div>
  </section>

  <section class="card">
    <h2>Analyze an image or video</h2>
    <div class="drop-area" id="drop-area">
      <p>Drag and drop a file here, or click to choose one</p>
      <p id="file-name" class="subtitle"></p>
    </div>
    <input type="file" id="file-input" accept="image/*,video/*" class="hidden">
    <img id="preview-image" class="preview hidden" alt="preview">
    <video id="preview-video" class="preview hidden" controls></video>
    <div><button class="primary" id="analyze-btn" disabled>Analyze</button></div>
  </section>

  <section id="results" class="card hidden">
    <h2>Results <span class="badge" id="count"></span></h2>
    <img id="result-image" class="result-media hidden" alt="annotated result">
    <video id="result-video" class="result-media hidden" controls></video>
    <table id="detections">
      <thead><tr><th>ID</th><th>Class</th><th>Confidence</th><th>Bounding box</th></tr></thead>
      <tbody></tbody>
    </table>
  </section>
</div>

<div class="loading hidden" id="loading"><div class="spinner"></div><div id="loading-text"></div></div>
<div class="toast" id="toast"></div>

<script>
// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------
const charts = {};
let previewKind = null;

// ---------------------------------------------------------------------------
// API helpers
// ---------------------------------------------------------------------------
async function api(method, path, body, headers) {
  const opts = { method, headers: headers || {} };
  if (body instanceof Blob) {
    opts.body = body;
  } else if (body) {
    opts.headers['Content-Type'] = 'application/json';
    opts.body = JSON.stringify(body);
  }
  const res = await fetch(path, opts);
  return res.json();
}

function toast(msg, isError) {
  const el = document.getElementById('toast');
  el.textContent = msg;
  el.className = 'toast show' + (isError ? ' error' : '');
  setTimeout(() => el.className = 'toast', 3000);
}

function show(id, visible) {
  document.getElementById(id).classList.toggle('hidden', !visible);
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------
function render(page) {
  if (page.error) {
    toast(page.error, true);
    return;
  }
  renderPerformance(page.performance);
  renderUpload(page.upload);
  renderResults(page.results);
  for (const n of page.notices || []) {
    if (n.level === 'error') alert(n.message); else toast(n.message);
  }
}

function renderPerformance(perf) {
  show('performance', perf.visible);
  if (!perf.visible) return;
  document.getElementById('model-key').textContent = perf.model_key ? 'Model ' + perf.model_key : '';
  for (const [field, text] of Object.entries(perf.fields)) {
    const el = document.querySelector(`[data-field="${field}"]`);
    if (el) el.textContent = text || '-';
  }
  for (const [id, config] of Object.entries(perf.charts || {})) {
    const canvas = document.getElementById(id);
    if (!canvas) continue;
    if (charts[id]) charts[id].destroy();
    charts[id] = new Chart(canvas, withTooltips(config));
  }
}

function withTooltips(config) {
  const tooltip = config.options.plugins.tooltip;
  if (!tooltip) return config;
  const format = tooltip.format;
  delete tooltip.format;
  if (format === 'percent') {
    tooltip.callbacks = { label: ctx => `${ctx.dataset.label}: ${ctx.parsed.y.toFixed(1)}%` };
  } else if (format === 'cell-text') {
    tooltip.callbacks = { label: ctx => (ctx.dataset.tooltips || [])[ctx.dataIndex] || '' };
  }
  return config;
}

function renderUpload(upload) {
  document.getElementById('drop-area').classList.toggle('active', upload.drop_active);
  document.getElementById('analyze-btn').disabled = !upload.analyze_enabled;
  document.getElementById('file-name').textContent = upload.file_name || '';
  const preview = upload.preview;
  previewKind = preview ? preview.kind : null;
  const img = document.getElementById('preview-image');
  const vid = document.getElementById('preview-video');
  show('preview-image', previewKind === 'image');
  show('preview-video', previewKind === 'video');
  if (previewKind === 'image' && img.src !== preview.src) img.src = preview.src;
  if (previewKind === 'video' && !vid.src.endsWith(preview.src)) vid.src = preview.src;
  if (previewKind !== 'video') vid.removeAttribute('src');
}

function renderResults(results) {
  show('results', results.visible);
  if (!results.visible) return;
  const media = results.media || {};
  show('result-image', media.kind === 'image');
  show('result-video', media.kind === 'video');
  if (media.kind === 'image') document.getElementById('result-image').src = media.src;
  if (media.kind === 'video') document.getElementById('result-video').src = media.src;
  document.getElementById('count').textContent = `${results.count_label}: ${results.count}`;

  const tbody = document.querySelector('#detections tbody');
  tbody.innerHTML = '';
  for (const row of results.rows) {
    const tr = tbody.insertRow();
    if (row.row === 'info') {
      const td = tr.insertCell();
      td.colSpan = 4;
      td.className = 'info';
      td.textContent = row.message;
      continue;
    }
    for (const [value, cls] of [[row.id, ''], [row.class, ''], [row.confidence, 'mono'], [row.bbox, 'mono']]) {
      const td = tr.insertCell();
      td.className = cls;
      td.textContent = value;
    }
  }
}

// ---------------------------------------------------------------------------
// Upload events
// ---------------------------------------------------------------------------
const dropArea = document.getElementById('drop-area');
const fileInput = document.getElementById('file-input');

for (const [name, event] of [['dragenter', 'enter'], ['dragover', 'over'], ['dragleave', 'leave']]) {
  dropArea.addEventListener(name, async e => {
    e.preventDefault();
    e.stopPropagation();
    if (name === 'dragover' && dropArea.classList.contains('active')) return;
    render(await api('POST', '/api/drag', { event }));
  });
}

dropArea.addEventListener('drop', async e => {
  e.preventDefault();
  e.stopPropagation();
  render(await api('POST', '/api/drag', { event: 'drop' }));
  await selectFile(e.dataTransfer.files[0]);
});

dropArea.addEventListener('click', () => fileInput.click());
fileInput.addEventListener('change', () => selectFile(fileInput.files[0]));

async function selectFile(file) {
  if (!file) return;
  const headers = {
    'Content-Type': file.type || 'application/octet-stream',
    'X-File-Name': encodeURIComponent(file.name),
  };
  render(await api('POST', '/api/select', file, headers));
}

document.getElementById('analyze-btn').addEventListener('click', async () => {
  const btn = document.getElementById('analyze-btn');
  btn.disabled = true;
  document.getElementById('loading-text').textContent =
    previewKind === 'video' ? 'Processing video, this may take a while...' : 'Analyzing image...';
  show('loading', true);
  try {
    render(await api('POST', '/api/analyze'));
    document.getElementById('results').scrollIntoView({ behavior: 'smooth' });
  } catch (e) {
    alert('An error occurred while processing the file.');
    btn.disabled = false;
  } finally {
    show('loading', false);
  }
});

// ---------------------------------------------------------------------------
// Health badge
// ---------------------------------------------------------------------------
async function loadHealth() {
  try {
    const h = await api('GET', '/api/health');
    const cls = h.service.reachable ? 'ok' : 'err';
    document.getElementById('health-badges').innerHTML =
      `<span class="badge ${cls}">${h.service.reachable ? '●' : '✕'} service</span>`;
  } catch (e) {
    // Silently ignore health badge errors
  }
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------
loadHealth();
// Each page load fetches the metrics once.
api('POST', '/api/metrics/reload').then(render);
</script>
</body>
</html>"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_load_requests_fresh_metrics() {
        assert!(INDEX_HTML.contains("api('POST', '/api/metrics/reload').then(render);"));
    }

    #[test]
    fn every_chart_has_a_canvas() {
        for id in [
            "precision_recall",
            "map_by_iou",
            "learning_curve",
            "map_by_epoch",
            "confusion_matrix",
        ] {
            assert!(INDEX_HTML.contains(&format!("<canvas id=\"{id}\">")), "missing canvas {id}");
        }
    }

    #[test]
    fn every_summary_field_has_a_target() {
        for field in ["map", "map50", "precision", "recall", "f1"] {
            assert!(INDEX_HTML.contains(&format!("data-field=\"{field}\"")), "missing field {field}");
        }
    }
}
