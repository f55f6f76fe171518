//! Smartmarks console demo.
//!
//! Opens two bookmark sessions for the same user against an in-memory local
//! store and shows writes in one session reaching the other through the
//! change feed.

use std::error::Error;
use std::sync::Arc;

use smartmarks::logging;
use smartmarks::managers::bookmark_session::BookmarkSession;
use smartmarks::services::local_store::LocalStore;
use smartmarks::services::remote_store::RemoteStore;
use smartmarks::types::bookmark::Bookmark;

fn section(name: &str) {
    println!("───────────────────────────────────────────────────────────────");
    println!("  {}", name);
    println!("───────────────────────────────────────────────────────────────");
}

fn print_view(label: &str, bookmarks: &[Bookmark]) {
    println!("  [{}] {} bookmark(s)", label, bookmarks.len());
    for b in bookmarks {
        println!("    - {} <{}>", b.title, b.url);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    println!();
    println!("  Smartmarks v{} demo", env!("CARGO_PKG_VERSION"));
    println!();

    let store: Arc<dyn RemoteStore> = Arc::new(LocalStore::open_in_memory(64)?);
    let mut window_a = BookmarkSession::open(Arc::clone(&store), "demo-user")?;
    let mut window_b = BookmarkSession::open(Arc::clone(&store), "demo-user")?;

    section("Add in window A");
    let docs = window_a.add_bookmark("Docs", "example.com")?;
    window_a.add_bookmark("Rust", "https://www.rust-lang.org")?;
    print_view("A", window_a.snapshot());

    section("Window B receives push events");
    print_view("B before", window_b.snapshot());
    let changed = window_b.pump_events();
    println!("  applied {} change(s)", changed);
    print_view("B after", window_b.snapshot());

    section("Delete in window B");
    window_b.delete_bookmark(&docs.id)?;
    window_a.pump_events();
    print_view("A", window_a.snapshot());
    print_view("B", window_b.snapshot());

    section("Validation");
    match window_a.add_bookmark("   ", "example.org") {
        Ok(_) => println!("  unexpected success"),
        Err(err) => println!("  rejected: {}", err),
    }

    window_a.close();
    window_b.close();
    println!();
    Ok(())
}
