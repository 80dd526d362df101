//! Demo driver: a seeded in-memory server behind the real store, so
//! the whole load/scroll/mutate cycle can be watched from a terminal.

use std::time::Duration;

use clap::Parser;

use chirp_core::{
    config::ChirpConfig,
    constant,
    loader::{LoadPhase, ProximityEvent, ProximitySource},
    post::Author,
    view::ViewKey,
};
use client::{mock::MockServer, Session};
use tokio::sync::mpsc;

/// Stands in for the viewport: one genuine scroll, then a near-end
/// signal every tick until nobody is listening anymore.
struct ScriptedScroller {
    tick: Duration,
}

impl ProximitySource for ScriptedScroller {
    fn subscribe(&mut self) -> mpsc::Receiver<ProximityEvent> {
        let (tx, rx) = mpsc::channel(16);
        let tick = self.tick;
        tokio::spawn(async move {
            if tx.send(ProximityEvent::Scrolled).await.is_err() {
                return;
            }
            loop {
                tokio::time::sleep(tick).await;
                if tx.send(ProximityEvent::NearEnd).await.is_err() {
                    break;
                }
            }
        });
        rx
    }
}

#[derive(Parser, Debug)]
#[command(name = "chirp-cli", about = "Drive the feed cache against a seeded in-memory server")]
struct Args {
    /// Number of posts seeded on the demo server
    #[arg(long, default_value_t = 45)]
    posts: usize,
    /// Page size for feed pagination
    #[arg(long, default_value_t = 10)]
    page_size: u32,
    /// Raise log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let default_filter = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let mut config = ChirpConfig::default();
    config.page_size = args.page_size.clamp(1, constant::PAGE_SIZE_LIMIT);

    let me = Author {
        id: 1,
        username: "me".into(),
        display_name: "Me".into(),
        avatar: None,
    };
    let server = MockServer::seeded(me.clone(), args.posts);
    let mut session = Session::new();
    let store = session.sign_in(me, server, &config);

    store.initial_load().await?;
    println!(
        "initial load: {} posts in view, status {:?}",
        store.feed_view().len(),
        store.pagination_status(ViewKey::Home)
    );

    // scroll to the bottom, pacing just past the cool-down
    let mut scroller = ScriptedScroller { tick: Duration::from_millis(1050) };
    let mut signals = scroller.subscribe();
    while let Some(event) = signals.recv().await {
        let fired = store.handle_proximity(ViewKey::Home, event).await?;
        if fired {
            let pages = store.cache().page_state(ViewKey::Home).expect("home is mounted");
            println!("loaded page {}: {} posts in view", pages.page(), store.feed_view().len());
        }
        if store.pagination_status(ViewKey::Home) == LoadPhase::Exhausted {
            break;
        }
    }
    drop(signals);
    println!("feed exhausted");

    // one full mutation round trip
    let id = store.submit_post("chirp chirp -- hello from the demo").await?;
    store.toggle_like(id).await?;
    store.submit_edit(id, "chirp chirp -- edited from the demo").await?;
    if let Some(post) = store.post_by_id(id) {
        println!("{post}");
    }
    store.submit_delete(id).await?;
    println!("deleted the demo post; {} posts in view", store.feed_view().len());

    // a look at one author's feed
    match store.open_author(2).await {
        Ok(()) => {
            if let Some(posts) = store.author_view(2) {
                println!(
                    "@ada has {} posts, status {:?}",
                    posts.len(),
                    store.pagination_status(ViewKey::Author(2))
                );
            }
        }
        Err(err) => println!("could not load @ada: {}", err.messages().join("; ")),
    }

    session.sign_out();
    Ok(())
}
