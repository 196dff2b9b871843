//! Integration tests entry point, following https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

#[ctor::ctor]
fn init() {
	let _ = color_eyre::config::HookBuilder::default().capture_span_trace_by_default(false).install();
	miette::set_hook(Box::new(|_| Box::new(miette::MietteHandlerOpts::new().terminal_links(true).build()))).expect("miette hook already set");
}

mod common;
pub use common::*;

mod end_to_end;
