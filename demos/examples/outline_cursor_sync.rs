// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cursor-following outline over a large generated program.
//!
//! This example shows how to combine:
//! - `understory_outline` for bounded rendering, lazy boundaries and truncation,
//! - `understory_outline_sync` for debounced cursor sync and echo-free selection,
//! - a `RetainedSurface` printed as indented text.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example outline_cursor_sync`

use serde_json::{Value, json};
use understory_outline::{
    BlockContent, JsonAstParser, OutlineSettings, RenderSurface, RetainedSurface, SurfaceStatus,
};
use understory_outline_sync::{CursorEvent, EditorId, OutlineSession};

const FUNCTIONS: u32 = 400;
const EDITOR: EditorId = EditorId(1);

fn span(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Value {
    json!({
        "startLine": start_line,
        "startColumn": start_column,
        "endLine": end_line,
        "endColumn": end_column,
    })
}

/// `function fN() { return N; }` over three lines per function.
fn program() -> String {
    let body: Vec<Value> = (0..FUNCTIONS)
        .map(|i| {
            let line = 3 * i + 1;
            json!({
                "type": "FunctionDeclaration",
                "span": span(line, 0, line + 2, 1),
                "id": { "type": "Identifier", "name": format!("f{i}"), "span": span(line, 9, line, 12) },
                "params": [],
                "body": {
                    "type": "BlockStatement",
                    "span": span(line, 14, line + 2, 1),
                    "body": [{
                        "type": "ReturnStatement",
                        "span": span(line + 1, 2, line + 1, 11),
                        "argument": { "type": "Literal", "value": i, "raw": i.to_string(), "span": span(line + 1, 9, line + 1, 10) }
                    }]
                }
            })
        })
        .collect();
    json!({
        "type": "Program",
        "span": span(1, 0, 3 * FUNCTIONS, 1),
        "body": body,
    })
    .to_string()
}

fn print_outline(surface: &RetainedSurface, max_lines: usize) {
    let lines = surface.lines();
    for line in lines.iter().take(max_lines) {
        println!("  {line}");
    }
    if lines.len() > max_lines {
        println!("  ... {} more lines", lines.len() - max_lines);
    }
}

fn main() {
    env_logger::init();

    let settings = OutlineSettings::from_pairs([
        ("lazyLoadThreshold", "1000"),
        ("lazyLoadDepth", "2"),
        ("maxRenderNodes", "800"),
    ]);
    let mut jumps = Vec::new();
    let mut session = OutlineSession::new(
        settings.limits(),
        RetainedSurface::new(),
        |editor: EditorId, line: u32, column: u32| {
            println!("jump_to({editor:?}, {line}, {column})");
            jumps.push((line, column));
        },
    );

    let Some(stats) = session.load(&mut JsonAstParser, &program(), EDITOR) else {
        eprintln!("parse failed: {:?}", session.surface().status());
        return;
    };
    println!(
        "pass {}: {} nodes rendered, lazy: {}, {} lazy boundaries, {} placeholders",
        stats.pass, stats.rendered, stats.lazy_active, stats.lazy_boundaries, stats.placeholders
    );
    print_outline(session.surface(), 12);

    // Drag the cursor through function 250; only the last position is resolved.
    let mut now = 0;
    for column in 0..6 {
        session.on_cursor(
            CursorEvent {
                editor: EDITOR,
                line: 3 * 250 + 2,
                column: 4 + column,
            },
            now,
        );
        now += 10;
    }
    session.tick(now);
    session.tick(now + 100);
    let echoed = session.pump_surface_events();
    let state = session.state();
    println!(
        "after cursor sync: {} nodes, {} resolutions, jumps from echo: {echoed}",
        state.registry().len(),
        state.stats().resolutions
    );
    if let Some(id) = session.surface().selected() {
        if let Some(block) = session.surface().block(id) {
            if let BlockContent::Node { label, summary, span, .. } = &block.content {
                println!("selected {label} {summary:?} at {span:?}");
            }
        }
        // A click by the user on the same node moves the text cursor.
        session.surface_mut().select(id);
        session.pump_surface_events();
    }

    // Load everything regardless of laziness.
    session.request_full_render();
    assert_eq!(session.surface().status(), &SurfaceStatus::Rendering);
    session.tick(now + 200);
    println!(
        "forced render: {} nodes, truncated: {}",
        session.state().registry().len(),
        session.state().has_truncation()
    );
    drop(session);
    println!("{} jump(s) in total", jumps.len());
}
