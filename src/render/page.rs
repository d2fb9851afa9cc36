/// Aggregate HTML page holding every registered chart

use super::chart::LineChart;
use super::template::{self, TemplateError};

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{{title}}</title>
{{scripts}}
</head>
<body>

<p>&nbsp;&nbsp;<b>{{title}}</b> <em>live process metrics, sampled only while this page is open</em></p>

<style> .box { justify-content:center; display:flex; flex-wrap:wrap } </style>
<div class="box">
{{charts}}
</div>

</body>
</html>
"#;

#[derive(Debug, Clone)]
pub struct Page {
    pub title: String,
    /// Prefix prepended to relative JS assets, e.g. `/page/statics/`
    pub assets_host: String,
    /// Relative names, absolute paths or full URLs
    pub js_assets: Vec<String>,
    charts: Vec<LineChart>,
}

impl Page {
    pub fn new(title: impl Into<String>, assets_host: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            assets_host: assets_host.into(),
            js_assets: Vec::new(),
            charts: Vec::new(),
        }
    }

    pub fn add_chart(&mut self, chart: LineChart) {
        self.charts.push(chart);
    }

    pub fn charts(&self) -> &[LineChart] {
        &self.charts
    }

    pub fn asset_url(&self, asset: &str) -> String {
        if asset.starts_with('/') || asset.starts_with("http://") || asset.starts_with("https://") {
            asset.to_string()
        } else {
            format!("{}{}", self.assets_host, asset)
        }
    }

    pub fn render(&self) -> Result<String, TemplateError> {
        let scripts: Vec<String> = self
            .js_assets
            .iter()
            .map(|asset| {
                format!(
                    r#"    <script src="{}"></script>"#,
                    escape_html(&self.asset_url(asset))
                )
            })
            .collect();

        let charts = self
            .charts
            .iter()
            .map(LineChart::render)
            .collect::<Result<Vec<_>, _>>()?;

        let title = escape_html(&self.title);
        let scripts = scripts.join("\n");
        let charts = charts.join("\n");

        template::render(
            PAGE_TEMPLATE,
            &[
                ("title", title.as_str()),
                ("scripts", scripts.as_str()),
                ("charts", charts.as_str()),
            ],
        )
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
