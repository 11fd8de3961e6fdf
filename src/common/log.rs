use tracing::{Subscriber, trace};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

pub const DEFAULT_DIRECTIVE: &str = "droppy=info";

fn subscriber(default_directive: &str) -> impl Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let tree = HierarchicalLayer::new(2)
        .with_writer(std::io::stderr)
        .with_indent_lines(true)
        .with_targets(true)
        .with_bracketed_fields(true);
    Registry::default().with(filter).with(tree)
}

/// Installs the global subscriber. `RUST_LOG` wins over `default_directive`.
/// Calling it twice is harmless.
pub fn init_logging(default_directive: &str) {
    if tracing::subscriber::set_global_default(subscriber(default_directive)).is_err() {
        trace!("Global subscriber already installed");
    }
}

