//! Embedded dashboard page.

use crate::trends::TimeframePreset;
use chrono::{Duration, NaiveDate};
use quick_xml::escape::escape;

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Google Trends Market Analyzer</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 1100px; margin: 2rem auto; padding: 0 1rem; color: #222; }
h1 { margin-bottom: .25rem; }
.info { background: #e8f1fb; border-radius: 6px; padding: .75rem 1rem; }
section { margin: 1.5rem 0; }
label { display: block; margin: .5rem 0 .25rem; font-weight: 600; }
input[type=text] { width: 100%; padding: .5rem; box-sizing: border-box; }
.row { display: flex; gap: 1rem; flex-wrap: wrap; }
.row > div { flex: 1; min-width: 220px; }
button { padding: .5rem 1.25rem; margin-right: .5rem; cursor: pointer; }
.phase { padding: .5rem .75rem; border-radius: 6px; margin: .25rem 0; }
.phase.running { background: #fff4d6; }
.phase.complete { background: #e2f5e6; }
.phase.error { background: #fbe3e3; }
.phase.skipped { background: #eeeeee; }
.error-msg { color: #b00020; }
table { border-collapse: collapse; margin: .5rem 0; font-size: .9rem; }
th, td { border: 1px solid #ccc; padding: .25rem .5rem; text-align: left; }
td.num { text-align: right; }
.results { display: flex; gap: 2rem; flex-wrap: wrap; }
.results .main { flex: 2; min-width: 400px; }
.results .side { flex: 1; min-width: 200px; }
#chart img { max-width: 100%; }
</style>
</head>
<body>
<h1>Google Trends Market Analyzer</h1>
<p class="info">This tool fetches and analyzes Google Trends data to provide market insights.</p>

<section>
<h2>1. Enter Your Keywords</h2>
<label for="keywords">Enter keywords to analyze, separated by commas:</label>
<input type="text" id="keywords" value="{{KEYWORDS}}">
<label for="upload">Or, upload a one-column CSV or XLSX keyword file:</label>
<input type="file" id="upload" accept=".csv,.xlsx">
<div id="upload-error" class="error-msg"></div>
</section>

<section>
<h2>2. Select Analysis Options</h2>
<div class="row">
<div>
<label for="mode">Analysis Mode:</label>
<select id="mode">
<option value="both">Both</option>
<option value="iot">Interest Over Time Only</option>
<option value="rq">Related Queries Only</option>
</select>
</div>
<div>
<label for="timeframe">Timeframe</label>
<select id="timeframe">
{{TIMEFRAME_OPTIONS}}
<option value="custom">Custom Date Range</option>
</select>
</div>
</div>
<div class="row" id="custom-range" hidden>
<div><label for="start">Start date</label><input type="date" id="start" value="{{START_DATE}}"></div>
<div><label for="end">End date</label><input type="date" id="end" value="{{END_DATE}}"></div>
</div>
</section>

<section>
<button id="run">Run Analysis</button>
<button id="reset">Reset</button>
<div id="run-error" class="error-msg"></div>
<div id="phases"></div>
</section>

<section id="results" hidden>
<h2>Analysis Results</h2>
<p id="showing"></p>
<div class="results">
<div class="main">
<div id="iot"></div>
<div id="rq"></div>
</div>
<div class="side">
<h3>Download Report</h3>
<a href="/api/report.xlsx" id="download"><button>Download Full Report as XLSX</button></a>
</div>
</div>
</section>

<script>
const $ = (id) => document.getElementById(id);
let polling = null;

function esc(text) {
  const div = document.createElement('div');
  div.textContent = text == null ? '' : String(text);
  return div.innerHTML;
}

$('timeframe').value = 'last12_months';

async function errorText(res) {
  const text = await res.text();
  try { return JSON.parse(text).error; } catch (_) { return text || res.statusText; }
}

$('timeframe').addEventListener('change', () => {
  $('custom-range').hidden = $('timeframe').value !== 'custom';
});

$('upload').addEventListener('change', async () => {
  const file = $('upload').files[0];
  if (!file) return;
  $('upload-error').textContent = '';
  const form = new FormData();
  form.append('file', file);
  const res = await fetch('/api/keywords/upload', { method: 'POST', body: form });
  if (res.ok) {
    $('keywords').value = (await res.json()).keywords_input;
  } else {
    $('upload-error').textContent = 'An error occurred while processing the uploaded file: ' + await errorText(res);
  }
});

$('run').addEventListener('click', async () => {
  $('run-error').textContent = '';
  const payload = { keywords: $('keywords').value, mode: $('mode').value };
  if ($('timeframe').value === 'custom') {
    if (!$('start').value || !$('end').value) {
      $('run-error').textContent = 'Error: Please choose both a start and an end date.';
      return;
    }
    payload.start_date = $('start').value;
    payload.end_date = $('end').value;
  } else {
    payload.preset = $('timeframe').value;
  }
  const res = await fetch('/api/analyze', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify(payload),
  });
  if (!res.ok) {
    $('run-error').textContent = 'Error: ' + await errorText(res);
    return;
  }
  startPolling();
});

$('reset').addEventListener('click', async () => {
  const res = await fetch('/api/reset', { method: 'POST' });
  if (!res.ok) {
    $('run-error').textContent = await errorText(res);
  }
  refresh();
});

function renderPhase(name, phase) {
  if (phase.status === 'idle') return '';
  return `<div class="phase ${phase.status}"><strong>${name}:</strong> ${esc(phase.label)}</div>`;
}

function queryTable(title, rows) {
  if (!rows) return '';
  let html = `<h4>${title}</h4><table><tr><th></th><th>query</th><th>value</th></tr>`;
  rows.forEach((r, i) => { html += `<tr><td>${i}</td><td>${esc(r.query)}</td><td class="num">${r.value}</td></tr>`; });
  return html + '</table>';
}

function render(state) {
  $('phases').innerHTML = renderPhase('Interest Over Time', state.iot_phase) + renderPhase('Related Queries', state.rq_phase);
  $('run').disabled = state.running;
  $('results').hidden = !state.data_fetched;
  if (!state.data_fetched) return;

  $('showing').innerHTML = `<strong>Showing Results for:</strong> '${esc(state.last_keywords.join(', '))}'`;

  if (state.iot) {
    let html = `<h3>Interest Over Time (IOT)</h3><div id="chart"><img src="/api/chart.svg?t=${Date.now()}" alt="Interest over time chart"></div>`;
    html += '<details><summary>View Raw IOT Data</summary><table><tr><th>date</th>';
    state.iot.columns.forEach(c => { html += `<th>${esc(c)}</th>`; });
    html += '</tr>';
    state.iot.rows.forEach(row => {
      html += `<tr><td>${esc(row.date)}</td>`;
      row.values.forEach(v => { html += `<td class="num">${v == null ? '' : v}</td>`; });
      html += '</tr>';
    });
    $('iot').innerHTML = html + '</table></details>';
  } else {
    $('iot').innerHTML = '';
  }

  if (state.rq) {
    let html = '<h3>Related Queries (RQ)</h3>';
    state.rq.forEach(entry => {
      html += `<details><summary>View RQ Raw Data for: '${esc(entry.keyword)}'</summary>`;
      html += queryTable('Top Related Queries', entry.top);
      html += queryTable('Rising Related Queries', entry.rising);
      html += '</details>';
    });
    $('rq').innerHTML = html;
  } else {
    $('rq').innerHTML = '';
  }
}

async function refresh() {
  const res = await fetch('/api/state');
  const state = await res.json();
  render(state);
  return state;
}

function startPolling() {
  if (polling) return;
  polling = setInterval(async () => {
    const state = await refresh();
    if (!state.running) { clearInterval(polling); polling = null; }
  }, 2000);
  refresh();
}

refresh().then(state => { if (state.running) startPolling(); });
</script>
</body>
</html>
"#;

/// Serialized name of a preset, as the analyze endpoint expects it.
fn preset_key(preset: TimeframePreset) -> String {
    serde_json::to_value(preset)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Render the page with the current keyword input. The custom range
/// starts out as the year ending `today`.
pub fn render_index(keywords_input: &str, today: NaiveDate) -> String {
    let options: String = TimeframePreset::ALL
        .iter()
        .map(|p| format!("<option value=\"{}\">{}</option>\n", preset_key(*p), p.label()))
        .collect();

    let start = (today - Duration::days(365)).format("%Y-%m-%d").to_string();
    let end = today.format("%Y-%m-%d").to_string();

    INDEX_TEMPLATE
        .replace("{{TIMEFRAME_OPTIONS}}", options.trim_end())
        .replace("{{START_DATE}}", &start)
        .replace("{{END_DATE}}", &end)
        .replace("{{KEYWORDS}}", &escape(keywords_input))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_custom_range_prefilled_with_last_year() {
        let html = render_index("boho dress", date(2025, 9, 8));
        assert!(html.contains(r#"id="start" value="2024-09-08""#));
        assert!(html.contains(r#"id="end" value="2025-09-08""#));
    }

    #[test]
    fn test_preset_keys() {
        assert_eq!(preset_key(TimeframePreset::Last12Months), "last12_months");
        assert_eq!(preset_key(TimeframePreset::AllTime), "all_time");
    }

    #[test]
    fn test_render_index_escapes_keywords() {
        let html = render_index("a \"quoted\" <kw>", date(2025, 9, 8));
        assert!(html.contains("value=\"a &quot;quoted&quot; &lt;kw&gt;\""));
        assert!(html.contains(">Last hour</option>"));
        assert!(!html.contains("{{"));
    }
}
