//! A scripted editing session against a headless surface, printing the
//! rendered markup after every step.

use std::rc::Rc;

use lectern_view::{
    ChangeSet, ChangeSpec, Decoration, DecorationSet, DocView, Document, EditorSelection,
    FocusState, LiveSurface, MarkDecoration, NodeId, Result, ViewConfig, ViewUpdate, Widget,
    WidgetType,
};
use tracing::info;

/// Inline chip standing in for a rendered token.
#[derive(Debug, PartialEq)]
struct Chip(&'static str);

impl WidgetType for Chip {
    fn to_dom(&self, surface: &mut LiveSurface) -> NodeId {
        let dom = surface.create_element("span");
        surface.set_attr(dom, "class", "chip");
        let label = surface.create_text(self.0);
        surface.append(dom, label);
        dom
    }
}

fn init_tracing() {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match tracing_subscriber::EnvFilter::try_new("error,lectern_view=info,example=info") {
            Ok(filter) => filter,
            Err(_) => tracing_subscriber::EnvFilter::new("error"),
        },
    };

    let _ = tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .try_init();
}

fn show(step: &str, view: &DocView) {
    let surface = view.surface();
    let markup: String = surface
        .children(view.content_dom())
        .into_iter()
        .map(|line| surface.markup(line))
        .collect::<Vec<_>>()
        .join("\n");
    let stats = surface.stats();
    info!(
        step,
        inserted = stats.inserted,
        removed = stats.removed,
        text_writes = stats.text_writes,
        selection_writes = stats.selection_writes,
        "rendered"
    );
    println!("== {step}\n{markup}\n");
}

fn edit(view: &mut DocView, specs: impl IntoIterator<Item = ChangeSpec>) -> Result<bool> {
    let changes = ChangeSet::of(view.doc().len(), specs)?;
    let update = ViewUpdate::new(view.doc(), changes)?;
    Ok(view.update(update))
}

/// Runs the session.
pub fn run() -> Result<()> {
    init_tracing();

    let doc = Document::new("fn main() {\n    greet(name);\n}");
    let keyword = Decoration::mark(MarkDecoration::with_class("kw")).range(0, 2);
    let mut view = DocView::with_surface(
        LiveSurface::new(),
        doc,
        ViewConfig::default(),
        vec![DecorationSet::new([keyword])],
    );
    view.surface_mut().set_focus_state(FocusState::Content);
    show("initial", &view);

    edit(&mut view, [ChangeSpec::insert(26, ", \"hi\"")])?;
    show("typed an argument", &view);

    edit(&mut view, [ChangeSpec::insert(11, "\n    let name = 1;")])?;
    show("inserted a line", &view);

    let chip: Widget = Rc::new(Chip("name"));
    let decorations = vec![
        DecorationSet::new([Decoration::mark(MarkDecoration::with_class("kw")).range(0, 2)]),
        DecorationSet::new([Decoration::replace(Some(chip)).range(20, 24)]),
    ];
    let update = ViewUpdate::unchanged(view.doc())
        .with_decorations(decorations)
        .with_selection(EditorSelection::cursor(24));
    view.update(update);
    show("replaced a name with a chip", &view);

    let heights = view.measure_visible_line_heights(80.0);
    let size = view.measure_text_size();
    info!(
        lines = heights.len(),
        min_width = view.min_width(),
        char_width = size.char_width,
        "measured"
    );

    view.check_invariants()?;
    Ok(())
}
