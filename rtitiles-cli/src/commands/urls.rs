//! Urls command - list the resource identifiers of a pyramid level.

use std::path::PathBuf;

use rtitiles::PyramidLayout;

use super::common::{check_level, ImageDescription};
use crate::error::CliError;

/// Arguments for the urls command.
pub struct UrlsArgs {
    pub description: PathBuf,
    pub level: usize,
    pub layer: Option<usize>,
}

/// Run the urls command.
pub fn run(args: UrlsArgs) -> Result<(), CliError> {
    let description = ImageDescription::load(&args.description)?;
    let layout = description.layout()?;

    for url in level_urls(&layout, args.level, args.layer)? {
        println!("{}", url);
    }
    Ok(())
}

/// Resource identifiers of every node on `level` that carries content, for
/// one layer or all of them.
pub fn level_urls(
    layout: &PyramidLayout,
    level: usize,
    layer: Option<usize>,
) -> Result<Vec<String>, CliError> {
    check_level(layout, level)?;
    if let Some(layer) = layer {
        if layer >= layout.layer_count() {
            return Err(CliError::InvalidArgument(format!(
                "layer {} out of range, images have {} layers",
                layer,
                layout.layer_count()
            )));
        }
    }

    let Some(info) = layout.level(level) else {
        return Ok(Vec::new());
    };
    let urls = info
        .indices()
        .filter(|&index| layout.node(index).is_some_and(|node| node.has_content()))
        .flat_map(|index| match layer {
            Some(layer) => layout
                .addresses()
                .resource_id(index, layer)
                .into_iter()
                .collect(),
            None => layout.resource_ids(index),
        })
        .collect();
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::common::tests::{description_file, DESCRIPTION};

    fn layout(text: &str) -> PyramidLayout {
        let file = description_file(text);
        ImageDescription::load(file.path()).unwrap().layout().unwrap()
    }

    #[test]
    fn test_all_layers_of_level() {
        let urls = level_urls(&layout(DESCRIPTION), 1, None).unwrap();
        assert_eq!(urls.len(), 12);
        assert_eq!(urls[0], "tiles/a/2_1.jpg");
        assert_eq!(urls[11], "tiles/c/5_3.jpg");
    }

    #[test]
    fn test_single_layer() {
        let urls = level_urls(&layout(DESCRIPTION), 0, Some(1)).unwrap();
        assert_eq!(urls, vec!["tiles/b/1_2.jpg"]);
    }

    #[test]
    fn test_content_free_nodes_are_skipped() {
        let text = DESCRIPTION
            .replace("\"contentWidth\": 820", "\"contentWidth\": 200")
            .replace("\"contentHeight\": 820", "\"contentHeight\": 200");
        let urls = level_urls(&layout(&text), 2, Some(0)).unwrap();
        assert_eq!(urls.len(), 4);
    }

    #[test]
    fn test_out_of_range_arguments() {
        let layout = layout(DESCRIPTION);
        assert!(matches!(
            level_urls(&layout, 3, None),
            Err(CliError::InvalidArgument(_))
        ));
        assert!(matches!(
            level_urls(&layout, 0, Some(3)),
            Err(CliError::InvalidArgument(_))
        ));
    }
}
