use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs the global fmt subscriber. `RUST_LOG` adds to the default `budget_ledger=info`.
pub fn init_tracing() {
  TRACING_INIT.call_once(|| {
    use tracing_subscriber::filter::Directive;
    use tracing_subscriber::{fmt, EnvFilter};

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "budget_ledger=info".parse::<Directive>() {
      filter = filter.add_directive(directive);
    }

    let _ = fmt().with_env_filter(filter).try_init();
  });
}
