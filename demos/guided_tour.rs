//! A three-step onboarding tour driven through the host event loop.
//!
//! The tour highlights the search box, waits for the user to type, then for a
//! click on the first result. Clicking "skip" at any point ends it.
//!
//! Run with:
//! ```sh
//! cargo run --example guided-tour
//! ```
use std::{cell::RefCell, rc::Rc};

use storyline::{Config, MemoryDocument, Position, Step, Story, host_loop};

/// Shared state every response of the tour sees.
struct Tour {
    name: &'static str,
    log: RefCell<Vec<String>>,
}

impl Tour {
    fn note(&self, line: impl Into<String>) {
        let line = line.into();
        println!("[{}] {line}", self.name);
        self.log.borrow_mut().push(line);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> storyline::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let doc = Rc::new(MemoryDocument::new());
    let header = doc.append(doc.root(), "header#top")?;
    let search = doc.append(header, "input#search[type=text]")?;
    let skip = doc.append(header, "button.skip")?;
    let results = doc.append(doc.root(), "ul#results")?;
    let first = doc.append(results, "li.result")?;
    let second = doc.append(results, "li.result")?;

    let tour = Story::new(
        doc.clone(),
        Tour {
            name: "onboarding",
            log: RefCell::new(Vec::new()),
        },
    )?;

    // Highlighting is part of each response, the way a tour would move a spotlight.
    let spotlight = doc.clone();
    tour.event(
        Step::<Tour>::new()
            .on("#search")
            .watch_for("focus")
            .response(move |scene, event| {
                scene.context().note(format!("search focused ({})", event.event_type()));
                if let Some(el) = event.origin() {
                    spotlight.add_class(el, "highlight")?;
                }
                scene.advance();
                Ok(())
            }),
    )?
    .event(
        Step::<Tour>::new()
            .on("#search")
            .watch_for("keyup")
            .response(|scene, _| {
                scene.context().note("user typed a query");
                scene.advance();
                Ok(())
            }),
    )?
    .event(
        Step::<Tour>::new()
            .on("#results > li.result")
            .watch_for("click")
            .response(|scene, event| {
                let clicked = event.origin().map(|el| el.to_string()).unwrap_or_default();
                scene.context().note(format!("result {clicked} opened, tour done"));
                scene.stop();
                Ok(())
            }),
    )?;

    // A second, independent story on the same document: the skip button.
    let skipper = Story::new(doc.clone(), tour.control())?;
    skipper.event(
        Step::<storyline::Control>::new()
            .on("button.skip")
            .watch_for("click")
            .response(|scene, _| {
                scene.context().stop();
                scene.stop();
                Ok(())
            }),
    )?;

    for info in tour.steps() {
        println!(
            "step {}: on={:?} watch_for={:?} bound={}",
            info.index, info.on, info.watch_for, info.bound
        );
    }

    let (host, handle) = host_loop(doc.clone(), &Config::default());
    let user = async {
        // Typing before focusing does nothing: step 0 is still active.
        handle.send(search, "keyup").await?;
        handle.send(search, "focus").await?;
        handle.send(search, "keyup").await?;
        handle.click(first).await?;
        // The tour is over; these are ignored.
        handle.click(second).await?;
        handle.click(skip).await?;
        handle.shutdown();
        Ok::<_, storyline::Error>(())
    };

    let (stats, driven) = tokio::join!(host.run(), user);
    driven?;

    println!(
        "delivered={} invoked={} failed={}",
        stats.delivered, stats.invoked, stats.failed
    );
    println!("tour position: {:?}", tour.position());
    assert_eq!(tour.position(), Position::Stopped);
    assert_eq!(tour.context().log.borrow().len(), 3);
    Ok(())
}
