/// HTTP side of the dashboard
/// One page of live charts, one JSON endpoint per chart and the embedded chart scripts

pub mod manager;
pub mod statics;
pub mod viewer;

pub use manager::{Manager, ManagerConfig};
pub use viewer::{views_for_source, LiveView, Payload, Viewer, ViewerConfig};

use crate::utils::statics_path;

/// Print the endpoint banner for a configured dashboard
pub fn print_banner(address: &str, page_path: &str, viewers: &[ViewerConfig]) {
    println!("📈 Live Dashboard");
    println!("   📍 Page:    http://{}{}", address, page_path);
    println!("   📦 Statics: http://{}{}/", address, statics_path(page_path));
    println!();
    println!("📚 Views:");
    for viewer in viewers {
        println!(
            "   GET  {:<28} - {} (every {} ms)",
            viewer.path,
            viewer.title,
            viewer.interval.as_millis()
        );
    }
    println!();
}
