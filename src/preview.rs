//! Builds a single self-contained HTML document for the live preview pane by
//! inlining the site's stylesheets and scripts into its page.

use crate::file_tree::{FileTreeNode, VirtualFileTree};

/// Preview document for the selected file, or the first page in the tree
/// when the selection is not an HTML file. `None` when there is no page.
///
/// Only stylesheets and scripts from the page's own folder (and below) are
/// inlined, so sibling sites do not bleed into each other.
pub fn compose_preview(tree: &VirtualFileTree, selected: Option<&str>) -> Option<String> {
    let (page_path, html) = pick_page(tree, selected)?;
    let scope = match page_path.rsplit_once('/') {
        Some((folder, _)) => format!("{}/", folder),
        None => String::new(),
    };

    let css = joined_sources(tree, ".css", &scope);
    let js = joined_sources(tree, ".js", &scope);

    let mut document = html.to_string();
    if !css.is_empty() {
        document = inline_styles(&document, &css);
    }
    if !js.is_empty() {
        document = inline_scripts(&document, &js);
    }
    Some(document)
}

fn pick_page<'a>(tree: &'a VirtualFileTree, selected: Option<&str>) -> Option<(&'a str, &'a str)> {
    if let Some(path) = selected.filter(|p| p.ends_with(".html")) {
        if let Some(FileTreeNode::File { path, content, .. }) = tree.node(path) {
            if !content.is_empty() {
                return Some((path.as_str(), content.as_str()));
            }
        }
    }
    tree.files_with_extension(".html")
        .into_iter()
        .find_map(|node| match node {
            FileTreeNode::File { path, content, .. } if !content.is_empty() => {
                Some((path.as_str(), content.as_str()))
            }
            _ => None,
        })
}

fn joined_sources(tree: &VirtualFileTree, extension: &str, scope: &str) -> String {
    tree.files_with_extension(extension)
        .into_iter()
        .filter(|node| node.path().starts_with(scope))
        .filter_map(|node| match node {
            FileTreeNode::File { content, .. } if !content.is_empty() => Some(content.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline_styles(html: &str, css: &str) -> String {
    let style = format!("<style>\n{}\n</style>", css);
    if html.contains("<head>") {
        html.replacen("</head>", &format!("{}\n</head>", style), 1)
    } else if html.contains("<html>") {
        html.replacen("<html>", &format!("<html>\n<head>\n{}\n</head>", style), 1)
    } else {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n{}\n</head>\n<body>\n{}\n</body>\n</html>",
            style, html
        )
    }
}

fn inline_scripts(html: &str, js: &str) -> String {
    let script = format!("<script>\n{}\n</script>", js);
    if html.contains("</body>") {
        html.replacen("</body>", &format!("{}\n</body>", script), 1)
    } else {
        format!("{}\n{}", html, script)
    }
}
