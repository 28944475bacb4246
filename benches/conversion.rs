//! Performance benchmarks for wiki rendering
//!
//! Measures:
//! - Markdown conversion of a diagram-heavy page
//! - Citation extraction on a page with many `<cite>` blocks
//! - Tree materialization from a module description and from a directory listing
//!
//! Run with: cargo bench

use codewiki_viewer::{
    codec::MarkdownConverter,
    config::{WikiLayout, WikiSettings},
    tree::WikiTree,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::{fmt::Write, fs, hint::black_box};
use tempfile::TempDir;

fn diagram_page(sections: usize) -> String {
    let mut page = String::from("# Module Overview\n\nGenerated documentation.\n\n");
    for i in 0..sections {
        let _ = write!(
            page,
            "## Component {i}\n\nSee https://example.com/c/{i} for details.\n\n\
             ```mermaid\ngraph TD\n    A{i}[\"Start\"] --> B{i}{{\"Check\"}}\n    B{i} -->|ok| C{i}\n```\n\n\
             | Field | Type |\n|---|---|\n| id | u64 |\n\n"
        );
    }
    page
}

fn cite_page(blocks: usize) -> String {
    let mut page = String::from("# Citations\n\n");
    for i in 0..blocks {
        let _ = write!(
            page,
            "Paragraph {i}.\n\n<cite>\n**Source:** `src/module_{i}.rs`\n\n- line {i}\n</cite>\n\n"
        );
    }
    page
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert_to_html");
    for sections in [10, 100] {
        let page = diagram_page(sections);
        group.bench_with_input(BenchmarkId::new("diagrams", sections), &page, |b, page| {
            let mut converter = MarkdownConverter::new();
            b.iter(|| converter.convert_to_html(black_box(page), None));
        });
    }
    let page = cite_page(50);
    group.bench_function("cites_50", |b| {
        let mut converter = MarkdownConverter::new();
        b.iter(|| converter.convert_to_html(black_box(&page), None));
    });
    group.finish();
}

fn module_wiki(modules: usize) -> Result<(TempDir, WikiLayout), Box<dyn std::error::Error>> {
    let tempdir = TempDir::new()?;
    let layout = WikiLayout::new(tempdir.path(), &WikiSettings::default());
    fs::create_dir_all(&layout.wiki_root)?;
    fs::write(&layout.overview, "# Overview\n")?;
    let mut tree = serde_json::Map::new();
    for i in 0..modules {
        let children: serde_json::Map<String, serde_json::Value> = (0..5)
            .map(|j| {
                (
                    format!("child_{i}_{j}"),
                    serde_json::json!({ "path": format!("src/m{i}/c{j}.rs") }),
                )
            })
            .collect();
        tree.insert(
            format!("module_{i}"),
            serde_json::json!({ "path": format!("src/m{i}"), "children": children }),
        );
        fs::write(layout.wiki_root.join(format!("module_{i}.md")), "# Module\n")?;
    }
    fs::write(&layout.module_tree, serde_json::Value::Object(tree).to_string())?;
    Ok((tempdir, layout))
}

fn bench_tree(c: &mut Criterion) {
    let (_module_dir, module_layout) = module_wiki(100).unwrap();
    c.bench_function("outline_from_module_tree", |b| {
        b.iter(|| {
            let tree = WikiTree::new(module_layout.clone());
            black_box(tree.outline().len())
        });
    });

    let (_plain_dir, plain_layout) = module_wiki(100).unwrap();
    fs::remove_file(&plain_layout.module_tree).unwrap();
    c.bench_function("outline_from_directory", |b| {
        b.iter(|| {
            let tree = WikiTree::new(plain_layout.clone());
            black_box(tree.outline().len())
        });
    });
}

criterion_group!(benches, bench_convert, bench_tree);
criterion_main!(benches);
