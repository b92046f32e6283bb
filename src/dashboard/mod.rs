mod handlers;
mod library;
mod server;

pub use library::{format_megabytes, media_type, validate_component, ClipDetails, ClipLibrary};
pub use server::{router, DashboardServer, DashboardServerBuilder, DashboardState};
