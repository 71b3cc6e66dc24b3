#![cfg(feature = "memory-dom")]

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use storyline::{
    Capabilities, Config, Dispatch, Error, MemoryDocument, Position, Result, Step, Story,
};

#[test]
fn test_event_fired_inside_response_sees_settled_cursor() -> Result<()> {
    for caps in [Capabilities::modern(), Capabilities::legacy()] {
        let doc = Rc::new(MemoryDocument::with_capabilities(caps));
        let a = doc.append(doc.root(), "button#a")?;
        let b = doc.append(doc.root(), "button#b")?;
        let second = Rc::new(Cell::new(0));

        let story = Story::new(doc.clone(), ())?;
        let host = doc.clone();
        let s = second.clone();
        story
            .event(
                Step::new()
                    .on("#a")
                    .watch_for("click")
                    .response(move |scene, _| {
                        // Fired before this step advanced; handled after.
                        let report = host.dispatch_event(b, "click")?;
                        assert!(report.is_ok());
                        scene.advance();
                        Ok(())
                    }),
            )?
            .event(
                Step::new()
                    .on("#b")
                    .watch_for("click")
                    .response(move |scene, _| {
                        s.set(s.get() + 1);
                        scene.advance();
                        Ok(())
                    }),
            )?;

        doc.dispatch_event(a, "click")?;
        assert_eq!(second.get(), 1);
        assert_eq!(story.position(), Position::Exhausted);
    }
    Ok(())
}

#[test]
fn test_self_triggering_response_is_capped() -> Result<()> {
    let doc = Rc::new(MemoryDocument::new());
    let a = doc.append(doc.root(), "button#a")?;
    let hits = Rc::new(Cell::new(0));
    let refused = Rc::new(Cell::new(0));

    let story = Story::with_config(
        doc.clone(),
        (),
        Config::default().with_max_deferred_events(3),
    )?;
    let host = doc.clone();
    let (h, r) = (hits.clone(), refused.clone());
    story.event(
        Step::new()
            .on("#a")
            .watch_for("click")
            .response(move |_, _| {
                h.set(h.get() + 1);
                let report = host.dispatch_event(a, "click")?;
                if report
                    .errors
                    .iter()
                    .any(|e| matches!(e, Error::ReentrancyOverflow(3)))
                {
                    r.set(r.get() + 1);
                }
                Ok(())
            }),
    )?;

    let report = doc.dispatch_event(a, "click")?;
    assert!(report.is_ok());
    assert_eq!(hits.get(), 4);
    assert_eq!(refused.get(), 1);

    // The budget applies per delivery from the host.
    doc.dispatch_event(a, "click")?;
    assert_eq!(hits.get(), 8);
    assert_eq!(story.position(), Position::Active(0));
    Ok(())
}

#[test]
fn test_registering_steps_from_a_response() -> Result<()> {
    let doc = Rc::new(MemoryDocument::new());
    let a = doc.append(doc.root(), "button#a")?;
    let fired = Rc::new(Cell::new(false));

    let story = Rc::new(Story::new(doc.clone(), ())?);
    let weak = Rc::downgrade(&story);
    let f = fired.clone();
    story.event(
        Step::new()
            .on("#a")
            .watch_for("click")
            .response(move |scene, _| {
                if let Some(story) = weak.upgrade() {
                    let f = f.clone();
                    story.event(Step::new().on("#a").watch_for("click").response(
                        move |_, _| {
                            f.set(true);
                            Ok(())
                        },
                    ))?;
                }
                scene.advance();
                Ok(())
            }),
    )?;

    doc.dispatch_event(a, "click")?;
    assert_eq!(story.len(), 2);
    assert!(!fired.get());

    doc.dispatch_event(a, "click")?;
    assert!(fired.get());
    Ok(())
}

#[test]
fn test_introspection_from_a_response() -> Result<()> {
    let doc = Rc::new(MemoryDocument::new());
    let a = doc.append(doc.root(), "button#a")?;
    let seen = Rc::new(RefCell::new(Vec::new()));

    let story = Rc::new(Story::new(doc.clone(), ())?);
    let weak = Rc::downgrade(&story);
    let sink = seen.clone();
    story
        .event(
            Step::new()
                .on("#a")
                .watch_for("click")
                .response(move |scene, _| {
                    if let Some(story) = weak.upgrade() {
                        let steps = story.steps();
                        let first_has_response = steps[0].has_response;
                        sink.borrow_mut()
                            .push((story.position(), steps.len(), first_has_response));
                    }
                    scene.advance();
                    Ok(())
                }),
        )?
        .event(Step::new())?;

    let report = doc.dispatch_event(a, "click")?;
    assert!(report.is_ok());
    assert_eq!(*seen.borrow(), vec![(Position::Active(0), 2, true)]);
    assert_eq!(story.position(), Position::Active(1));
    Ok(())
}
