/// Chart and page rendering
///
/// Produces the HTML and JavaScript the browser needs to draw ECharts line
/// charts. The charting library itself is served as an opaque static asset.

pub mod chart;
pub mod page;
pub mod template;

pub use chart::{chart_id_for, LineChart};
pub use page::Page;
pub use template::TemplateError;
