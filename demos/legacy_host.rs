//! The same story on a host that only offers legacy `attachEvent`-style
//! handlers and no native selector matching.
//!
//! Run with:
//! ```sh
//! cargo run --example legacy-host
//! ```
use std::rc::Rc;

use storyline::{Capabilities, Dispatch, MemoryDocument, Step, Story};

fn main() -> storyline::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let doc = Rc::new(MemoryDocument::with_capabilities(Capabilities::legacy()));
    let form = doc.append(doc.root(), "form#signup")?;
    let name = doc.append(form, "input[name=name]")?;
    let submit = doc.append(form, "button#submit[type=submit]")?;

    let story = Story::new(doc.clone(), "signup")?;
    println!(
        "binding={} matching={}",
        story.binding(),
        story.matching()
    );

    story
        .event(
            Step::new()
                .on("input[name=name]")
                .watch_for("change")
                .response(|scene, event| {
                    // Legacy hosts report the element through `src_element`.
                    println!("{}: name entered on {:?}", scene.context(), event.src_element());
                    scene.advance();
                    Ok(())
                }),
        )?
        .event(
            Step::new()
                .on("#signup #submit")
                .watch_for("click")
                .response(|scene, _| {
                    println!("{}: submitted", scene.context());
                    scene.advance();
                    Ok(())
                }),
        )?;

    // Out of order: the submit step is not active yet.
    doc.dispatch_event(submit, "click")?;
    println!("after early click: {}", story.cursor());

    doc.dispatch_event(name, "change")?;
    doc.dispatch_event(submit, "click")?;
    println!("finished: {:?}", story.position());
    Ok(())
}
