/// Line chart handle rendered as an ECharts container plus init script

use serde_json::{json, Value};

use super::template::{self, TemplateError};

const DEFAULT_WIDTH: &str = "800px";
const DEFAULT_HEIGHT: &str = "600px";

const CHART_TEMPLATE: &str = r#"<div class="container">
    <div class="item" id="{{id}}" style="width:{{width}};height:{{height}};"></div>
</div>
<script type="text/javascript">
    "use strict";
    window.liveCharts = window.liveCharts || {};
    window.liveCharts["{{id}}"] = echarts.init(document.getElementById("{{id}}"), "{{theme}}", { renderer: "canvas" });
    window.liveCharts["{{id}}"].setOption({{options}});
{{js_funcs}}
</script>
"#;

#[derive(Debug, Clone)]
pub struct LineChart {
    pub id: String,
    pub title: String,
    pub theme: String,
    pub width: String,
    pub height: String,
    pub x_axis_name: String,
    pub y_axis_name: String,
    /// ECharts axis label formatter, e.g. `{value} MB`
    pub y_axis_formatter: String,
    pub series: Vec<String>,
    js_funcs: Vec<String>,
}

impl LineChart {
    pub fn new(id: impl Into<String>, title: impl Into<String>, series: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            theme: String::new(),
            width: DEFAULT_WIDTH.to_string(),
            height: DEFAULT_HEIGHT.to_string(),
            x_axis_name: "Time".to_string(),
            y_axis_name: String::new(),
            y_axis_formatter: "{value}".to_string(),
            series,
            js_funcs: Vec::new(),
        }
    }

    /// Attach a script snippet that runs after the chart is initialised
    pub fn add_js_func(&mut self, js: impl Into<String>) {
        self.js_funcs.push(js.into());
    }

    pub fn js_funcs(&self) -> &[String] {
        &self.js_funcs
    }

    pub fn options(&self) -> Value {
        let series: Vec<Value> = self
            .series
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "type": "line",
                    "smooth": true,
                    "data": [],
                })
            })
            .collect();

        json!({
            "title": { "text": self.title },
            "legend": { "show": true },
            "tooltip": { "show": true, "trigger": "axis" },
            "xAxis": [{ "name": self.x_axis_name, "type": "category", "data": [] }],
            "yAxis": [{
                "name": self.y_axis_name,
                "type": "value",
                "axisLabel": { "formatter": self.y_axis_formatter },
            }],
            "series": series,
        })
    }

    pub fn render(&self) -> Result<String, TemplateError> {
        // Keep "</script>" inside string values from closing the tag early
        let options = self.options().to_string().replace("</", "<\\/");
        let js_funcs = self.js_funcs.join("\n");

        template::render(
            CHART_TEMPLATE,
            &[
                ("id", self.id.as_str()),
                ("width", self.width.as_str()),
                ("height", self.height.as_str()),
                ("theme", self.theme.as_str()),
                ("options", options.as_str()),
                ("js_funcs", js_funcs.as_str()),
            ],
        )
    }
}

/// Derive a DOM-safe chart id from a viewer name
pub fn chart_id_for(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("live_{}", sanitized)
}
