use chrono::{TimeDelta, TimeZone, Utc};
use shortbread::script::binding_name;
use shortbread::{
    Callback, Lifecycle, LinkElement, LoadOutcome, Page, PendingSet, PolyfillState,
    PreloadSupport, ScriptElement, Tracker,
};
use std::cell::Cell;
use std::rc::Rc;

fn page(support: PreloadSupport) -> Page {
    Page::with_clock(support, Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap())
}

fn counter(page: &mut Page, name: &str) -> Rc<Cell<u32>> {
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    page.define_global(name, move || h.set(h.get() + 1));
    hits
}

fn tracker(ids: &[&str], hash: &str, slot: Option<&str>, callback: Callback) -> Tracker {
    Tracker::new(
        PendingSet::list(ids.iter().copied()),
        Some(hash.to_owned()),
        slot.map(str::to_owned),
        callback,
    )
}

fn preload(id: &str, binding: &str) -> LinkElement {
    LinkElement::style_preload(id, format!("/{id}.css"))
        .owned_by(binding)
}

#[test]
fn scripts_and_native_preloads_set_cookie_for_next_visit() {
    let mut page = page(PreloadSupport::Native);
    let bind = binding_name("feedf00d");
    let hits = counter(&mut page, "allLoaded");
    for id in ["js1", "js2"] {
        page.document_mut().push_script(
            ScriptElement::new(id, format!("/{id}.js"))
                .with_onload(format!("{bind}.onloadScript(this)")),
        );
    }
    page.document_mut().push_link(preload("css1", &bind));
    page.install_tracker(
        bind.clone(),
        tracker(
            &["js1", "js2", "css1"],
            "feedf00d",
            Some("main"),
            Callback::named("allLoaded"),
        ),
    );

    assert_eq!(page.start_polyfill(bind.clone()), PolyfillState::Inert);
    assert!(page.in_flight().is_empty());

    assert_eq!(
        page.script_loaded(&bind, "js2"),
        Some(LoadOutcome::Pending { required: 2 })
    );
    assert!(!page.document().scripts()[1].is_hooked());
    assert_eq!(
        page.signal_loaded(&bind, "css1"),
        Some(LoadOutcome::Pending { required: 1 })
    );
    assert_eq!(
        page.script_loaded(&bind, "js1"),
        Some(LoadOutcome::Completed)
    );
    assert_eq!(hits.get(), 1);

    let now = page.now();
    let jar = page.unload();
    let cookie = jar.get_live("sb_main", now).expect("completion cookie");
    assert_eq!(cookie.value, "feedf00d");

    // A repeat visit starts with the cookie already present.
    let next = Page::with_clock(PreloadSupport::Native, now + TimeDelta::days(1))
        .with_cookies(jar);
    assert!(next.cookies().get_live("sb_main", next.now()).is_some());
}

#[test]
fn legacy_script_waits_for_complete_ready_state() {
    let mut page = page(PreloadSupport::Native);
    page.document_mut()
        .push_script(ScriptElement::new("old", "/old.js").with_ready_state("loaded"));
    page.install_tracker(
        "sbx",
        Tracker::new(PendingSet::list(["old"]), None, None, Callback::None),
    );

    assert_eq!(page.script_loaded("sbx", "old"), Some(LoadOutcome::NotReady));
    page.document_mut().script_mut("old").unwrap().ready_state = Some("complete".into());
    assert_eq!(page.script_loaded("sbx", "old"), Some(LoadOutcome::Completed));
}

#[test]
fn polyfill_fetches_styles_and_reports_to_tracker() {
    let mut page = page(PreloadSupport::Missing);
    page.document_mut().push_link(preload("a", "sbm"));
    page.install_tracker("sbm", tracker(&["a", "b"], "m", None, Callback::None));

    assert_eq!(page.start_polyfill("sbm"), PolyfillState::Polling);
    assert_eq!(page.in_flight().len(), 1);

    // A link inserted later is picked up by the next tick, not before.
    page.document_mut()
        .push_link(preload("b", "sbm").with_media("screen"));
    page.advance(TimeDelta::milliseconds(50));
    assert_eq!(page.in_flight().len(), 1);
    page.advance(TimeDelta::milliseconds(60));
    assert_eq!(page.in_flight().len(), 2);

    assert_eq!(
        page.complete_fetch("b"),
        Some(LoadOutcome::Pending { required: 1 })
    );
    assert_eq!(page.complete_fetch("a"), Some(LoadOutcome::Completed));
    assert!(page.cookies().get("sb").is_some());

    // Fetched sheets are appended; the original links stay without a rel.
    let applied: Vec<_> = page
        .document()
        .links()
        .iter()
        .filter(|l| l.rel.as_deref() == Some("stylesheet"))
        .map(|l| (l.href.as_str(), l.media.as_deref()))
        .collect();
    assert_eq!(applied, vec![("/b.css", Some("screen")), ("/a.css", None)]);
    assert_eq!(page.document().link("a").unwrap().rel, None);
}

#[test]
fn lifecycle_event_runs_final_poll_and_stops_ticks() {
    let mut page = page(PreloadSupport::Broken);
    page.install_tracker("sbm", tracker(&["late"], "m", None, Callback::None));
    page.start_polyfill("sbm");

    // Inserted between ticks; only the final poll can catch it.
    page.advance(TimeDelta::milliseconds(30));
    page.document_mut().push_link(preload("late", "sbm"));
    page.fire_lifecycle(Lifecycle::DomContentLoaded);
    assert_eq!(page.polyfill_state("sbm"), Some(PolyfillState::Stopped));
    assert_eq!(page.in_flight().len(), 1);

    page.document_mut().push_link(preload("after", "sbm"));
    page.advance(TimeDelta::seconds(1));
    page.fire_lifecycle(Lifecycle::Load);
    assert_eq!(page.in_flight().len(), 1);
    let after = page.document().link("after").unwrap();
    assert!(after.is_pending_style_preload());

    assert_eq!(page.complete_fetch("late"), Some(LoadOutcome::Completed));
}

#[test]
fn native_onload_racing_polyfill_fetch_fires_once() {
    let mut page = page(PreloadSupport::Missing);
    let hits = counter(&mut page, "done");
    page.document_mut().push_link(preload("s", "sbm"));
    page.install_tracker("sbm", tracker(&["s"], "m", None, Callback::named("done")));
    page.start_polyfill("sbm");

    assert_eq!(page.signal_loaded("sbm", "s"), Some(LoadOutcome::Completed));
    assert_eq!(page.complete_fetch("s"), Some(LoadOutcome::Unknown));
    assert_eq!(hits.get(), 1);
    assert_eq!(page.cookies().writes(), 1);
}

#[test]
fn resource_that_never_arrives_leaves_tracker_pending() {
    let mut page = page(PreloadSupport::Native);
    let hits = counter(&mut page, "done");
    page.install_tracker(
        "sbm",
        tracker(&["a", "never"], "m", None, Callback::named("done")),
    );
    page.signal_loaded("sbm", "a");
    page.advance(TimeDelta::days(1));
    assert!(!page.tracker("sbm").unwrap().is_completed());
    assert_eq!(hits.get(), 0);
    assert!(page.unload().is_empty());
}

#[test]
fn independent_embeds_use_their_own_binding_and_cookie() {
    let mut page = page(PreloadSupport::Native);
    let a = binding_name("aaaa0000");
    let b = binding_name("bbbb1111");
    page.install_tracker(
        a.clone(),
        tracker(&["x"], "aaaa0000", Some("one"), Callback::None),
    );
    page.install_tracker(
        b.clone(),
        tracker(&["x"], "bbbb1111", Some("two"), Callback::None),
    );

    assert_eq!(page.signal_loaded(&a, "x"), Some(LoadOutcome::Completed));
    assert!(!page.tracker(&b).unwrap().is_completed());
    assert_eq!(page.signal_loaded(&b, "x"), Some(LoadOutcome::Completed));

    let jar = page.unload();
    assert_eq!(jar.get("sb_one").map(|c| c.value.as_str()), Some("aaaa0000"));
    assert_eq!(jar.get("sb_two").map(|c| c.value.as_str()), Some("bbbb1111"));
}

#[test]
fn polyfilled_embeds_route_fetches_to_their_own_tracker() {
    let mut page = page(PreloadSupport::Missing);
    let a = binding_name("aaaa0000");
    let b = binding_name("bbbb1111");
    page.document_mut().push_link(preload("a", &a));
    page.document_mut().push_link(preload("b", &b));
    page.install_tracker(
        a.clone(),
        tracker(&["a"], "aaaa0000", Some("one"), Callback::None),
    );
    page.install_tracker(
        b.clone(),
        tracker(&["b"], "bbbb1111", Some("two"), Callback::None),
    );

    // Each embed's polyfill only takes its own links.
    assert_eq!(page.start_polyfill(a.clone()), PolyfillState::Polling);
    assert_eq!(page.in_flight().len(), 1);
    assert_eq!(page.start_polyfill(b.clone()), PolyfillState::Polling);
    assert_eq!(page.in_flight().len(), 2);

    // A late link for the first embed is still picked up by its own task.
    page.document_mut().push_link(preload("a2", &a));
    page.advance(TimeDelta::milliseconds(100));
    let late: Vec<_> = page
        .in_flight()
        .iter()
        .filter(|f| f.link_id == "a2")
        .map(|f| f.binding.as_str())
        .collect();
    assert_eq!(late, vec![a.as_str()]);

    assert_eq!(page.complete_fetch("a"), Some(LoadOutcome::Completed));
    assert_eq!(page.complete_fetch("b"), Some(LoadOutcome::Completed));
    assert_eq!(page.complete_fetch("a2"), Some(LoadOutcome::Unknown));
    assert!(page.tracker(&a).unwrap().is_completed());
    assert!(page.tracker(&b).unwrap().is_completed());

    page.fire_lifecycle(Lifecycle::Load);
    assert_eq!(page.polyfill_state(&a), Some(PolyfillState::Stopped));
    assert_eq!(page.polyfill_state(&b), Some(PolyfillState::Stopped));

    let jar = page.unload();
    assert_eq!(jar.get("sb_one").map(|c| c.value.as_str()), Some("aaaa0000"));
    assert_eq!(jar.get("sb_two").map(|c| c.value.as_str()), Some("bbbb1111"));
}
