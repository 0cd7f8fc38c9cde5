//! Plan command - print the level table of a pyramid.

use std::fmt::Write;
use std::path::PathBuf;

use rtitiles::PyramidLayout;

use super::common::ImageDescription;
use crate::error::CliError;

/// Arguments for the plan command.
pub struct PlanArgs {
    pub description: PathBuf,
}

/// Run the plan command.
pub fn run(args: PlanArgs) -> Result<(), CliError> {
    let description = ImageDescription::load(&args.description)?;
    let layout = description.layout()?;

    println!(
        "{}x{} image, content {}x{}, {}px tiles, {} layers, {:?} addressing",
        description.config.max_width,
        description.config.max_height,
        description.config.content_width,
        description.config.content_height,
        description.config.tile_edge,
        layout.layer_count(),
        description.config.tiling_strategy,
    );
    println!();
    print!("{}", render_table(&layout));
    Ok(())
}

/// Level table: resolution, first index, node count and content-free nodes.
pub fn render_table(layout: &PyramidLayout) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:>11}  {:>11}  {:>9}  {:>12}",
        "Level", "Resolution", "First index", "Nodes", "Content-free"
    );

    let mut total_empty = 0;
    for (level, info) in layout.levels().iter().enumerate() {
        let empty = layout.content_free_count(level);
        total_empty += empty;
        let resolution = format!("{}x{}", info.resolution.x, info.resolution.y);
        let _ = writeln!(
            out,
            "{:>5}  {:>11}  {:>11}  {:>9}  {:>12}",
            level, resolution, info.first_index, info.node_count, empty
        );
    }

    let total = layout.node_count();
    let _ = writeln!(
        out,
        "{:>5}  {:>11}  {:>11}  {:>9}  {:>12}",
        "Total", "", "", total, total_empty
    );
    let _ = writeln!(
        out,
        "\n{} fetchable tiles, {} layer requests for the full pyramid",
        total - total_empty,
        (total - total_empty) * layout.layer_count()
    );
    out
}
