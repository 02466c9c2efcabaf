use super::*;
use crate::build::error::PageFailure;
use crate::processors::testing::Fixture;
use std::{collections::BTreeSet, fs};

const PAGES: &str = r#"
    [[rule]]
    pattern = "templates/*"
    processors = ["ignore"]

    [[rule]]
    pattern = "*.md"
    processors = ["config", "markdown", "template templates/page.html"]
    dest = "{dir}/{stem}.html"
"#;

fn pages_fixture() -> Fixture {
    Fixture::new(
        PAGES,
        &[
            ("templates/page.html", "<main>{{ content }}</main>"),
            ("index.md", "# Hi"),
            ("blog/a.md", "+++\ntitle = \"A\"\n+++\nA"),
        ],
    )
}

fn names(paths: &[PathBuf]) -> BTreeSet<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn test_second_pass_builds_nothing() {
    let fx = pages_fixture();
    let mut site = fx.site();

    let first = render(&mut site).unwrap();
    assert!(first.is_success());
    assert_eq!(
        names(&first.built),
        set(&["templates/page.html", "index.md", "blog/a.md"])
    );
    assert_eq!(first.written, 2);
    assert!(fx.read_output("index.html").contains("<main><h1>Hi</h1>"));
    assert!(fx.read_output("blog/a.html").contains("<p>A</p>"));
    assert!(!fx.output("templates/page.html").exists());

    let second = render(&mut site).unwrap();
    assert!(second.built.is_empty());
    assert_eq!(second.skipped.len(), 3);
    assert_eq!(second.written, 0);
    assert_eq!(second.rounds, 0);
}

#[test]
fn test_fresh_site_leaves_identical_outputs_alone() {
    let fx = pages_fixture();
    render(&mut fx.site()).unwrap();
    let before = fx.read_output("blog/a.html");

    let report = render(&mut fx.site()).unwrap();
    assert_eq!(report.built.len(), 3);
    assert_eq!(report.written, 0);
    assert_eq!(report.unchanged, 2);
    assert_eq!(fx.read_output("blog/a.html"), before);
}

#[test]
fn test_force_rebuilds_everything() {
    let fx = pages_fixture();
    let mut site = fx.site();
    render(&mut site).unwrap();

    site.force_refresh = true;
    let report = render(&mut site).unwrap();
    assert_eq!(report.built.len(), 3);
    assert!(report.skipped.is_empty());
}

#[test]
fn test_dry_run_writes_nothing() {
    let fx = pages_fixture();
    let mut site = fx.site();

    let report = dry_run(&mut site).unwrap();
    assert!(report.is_success());
    assert_eq!(report.written, 0);
    assert!(!fx.config.build.output.exists());
    let page = site.find(Path::new("blog/a.html")).unwrap();
    assert_eq!(page.metadata["title"], "A");
    assert!(page.content().unwrap().contains("<p>A</p>"));

    let report = render(&mut site).unwrap();
    assert_eq!(report.written, 2);
    assert!(fx.output("blog/a.html").exists());
}

#[test]
fn test_template_change_rebuilds_users() {
    let fx = pages_fixture();
    let mut site = fx.site();
    render(&mut site).unwrap();

    fx.write("templates/page.html", "<article>{{ content }}</article>");
    let report = rebuild(&mut site, &[fx.source("templates/page.html")]).unwrap();
    assert_eq!(
        names(&report.built),
        set(&["templates/page.html", "index.md", "blog/a.md"])
    );
    assert!(fx.read_output("index.html").starts_with("<article>"));
}

#[test]
fn test_single_change_rebuilds_one_page() {
    let fx = pages_fixture();
    let mut site = fx.site();
    render(&mut site).unwrap();

    fx.write("blog/a.md", "+++\ntitle = \"A\"\n+++\nChanged");
    let report = rebuild(&mut site, &[fx.source("blog/a.md")]).unwrap();
    assert_eq!(names(&report.built), set(&["blog/a.md"]));
    assert_eq!(report.written, 1);
    assert!(fx.read_output("blog/a.html").contains("Changed"));
}

#[test]
fn test_transitive_rule_dependencies() {
    let fx = Fixture::new(
        r#"
        [[rule]]
        pattern = "c.txt"
        deps = ["b.txt"]

        [[rule]]
        pattern = "b.txt"
        deps = ["a.txt"]

        [[rule]]
        pattern = "*"
        "#,
        &[("a.txt", "a"), ("b.txt", "b"), ("c.txt", "c"), ("d.txt", "d")],
    );
    let mut site = fx.site();
    render(&mut site).unwrap();

    fx.write("a.txt", "a2");
    let report = rebuild(&mut site, &[fx.source("a.txt")]).unwrap();
    assert_eq!(
        report.built,
        vec![PathBuf::from("a.txt"), PathBuf::from("b.txt"), PathBuf::from("c.txt")]
    );
    assert_eq!(names(&report.skipped), set(&["d.txt"]));
    assert_eq!(fx.read_output("a.txt"), "a2");
}

#[test]
fn test_cycle_fails_only_its_members() {
    let fx = Fixture::new(
        r#"
        [[rule]]
        pattern = "a.txt"
        deps = ["b.txt"]

        [[rule]]
        pattern = "b.txt"
        deps = ["a.txt"]

        [[rule]]
        pattern = "c.txt"
        deps = ["a.txt"]

        [[rule]]
        pattern = "*"
        "#,
        &[("a.txt", "a"), ("b.txt", "b"), ("c.txt", "c"), ("d.txt", "d")],
    );
    let mut site = fx.site();
    let report = render(&mut site).unwrap();

    for member in ["a.txt", "b.txt"] {
        match report.failure(Path::new(member)) {
            Some(PageFailure::Cycle(cycle)) => assert_eq!(cycle.pages.len(), 2),
            other => panic!("{member}: unexpected {other:?}"),
        }
    }
    assert!(matches!(
        report.failure(Path::new("c.txt")),
        Some(PageFailure::BlockedByCycle(_))
    ));
    assert_eq!(report.built, vec![PathBuf::from("d.txt")]);
    assert_eq!(fx.read_output("d.txt"), "d");
    assert!(!fx.output("a.txt").exists());
}

#[test]
fn test_duplicate_destination_writes_nothing() {
    let fx = Fixture::new(
        r#"
        [[rule]]
        pattern = "*.md"
        dest = "same.html"
        "#,
        &[("a.md", "a"), ("b.md", "b")],
    );
    let mut site = fx.site();

    let err = render(&mut site).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateDestination { .. }));
    assert!(!fx.config.build.output.exists());

    // Nothing was recorded as built, so the next pass hits the same error.
    assert!(render(&mut site).is_err());
}

#[test]
fn test_failed_page_keeps_previous_output() {
    let fx = pages_fixture();
    let mut site = fx.site();
    render(&mut site).unwrap();
    let before = fx.read_output("index.html");

    let template = fx.source("templates/page.html");
    fs::remove_file(&template).unwrap();
    let report = rebuild(&mut site, &[template.clone()]).unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        report.failure(Path::new("index.md")),
        Some(PageFailure::Processor(e)) if e.processor == "template"
    ));
    assert_eq!(names(&report.removed), set(&["templates/page.html"]));
    assert_eq!(fx.read_output("index.html"), before);

    fx.write("templates/page.html", "<section>{{ content }}</section>");
    let report = rebuild(&mut site, &[template]).unwrap();
    assert!(report.is_success());
    assert!(fx.read_output("index.html").starts_with("<section>"));
}

#[test]
fn test_removed_source_deletes_output() {
    let fx = pages_fixture();
    let mut site = fx.site();
    render(&mut site).unwrap();
    assert!(fx.output("blog/a.html").exists());

    let path = fx.source("blog/a.md");
    fs::remove_file(&path).unwrap();
    let report = rebuild(&mut site, &[path]).unwrap();

    assert_eq!(names(&report.removed), set(&["blog/a.md"]));
    assert!(!fx.output("blog/a.html").exists());
    assert!(!fx.output("blog").exists());
    assert!(site.page(Path::new("blog/a.md")).is_none());
}

const TAGS: &str = r#"
    [[rule]]
    pattern = "templates/*"
    processors = ["ignore"]

    [[rule]]
    pattern = "posts/*.md"
    processors = ["config", "tags tags/{tag}.tag", "markdown"]
    dest = "{dir}/{stem}.html"

    [[rule]]
    pattern = "tags/*.tag"
    processors = ["collect tagged", "template templates/tag.html"]
    dest = "tags/{stem}.html"
"#;

#[test]
fn test_tag_pages_follow_their_posts() {
    let fx = Fixture::new(
        TAGS,
        &[
            ("templates/tag.html", "{{ tag }}\n{{ pages }}"),
            ("posts/a.md", "title: A\ntags: rust, web\n----\nA"),
            ("posts/b.md", "title: B\ntags: rust\n----\nB"),
        ],
    );
    let mut site = fx.site();

    let report = render(&mut site).unwrap();
    assert!(report.is_success());
    assert_eq!(report.rounds, 2);
    let rust = site.page(Path::new("tags/rust.tag")).unwrap();
    assert_eq!(rust.origins.len(), 2);

    let html = fx.read_output("tags/rust.html");
    assert!(html.starts_with("rust\n<ul>"));
    assert!(html.contains("/posts/a.html"));
    assert!(html.contains("/posts/b.html"));
    assert!(!fx.read_output("tags/web.html").contains("/posts/b.html"));

    // Dropping the only post tagged `web` drops the tag page with it.
    fx.write("posts/a.md", "title: A\ntags: rust\n----\nA");
    let report = rebuild(&mut site, &[fx.source("posts/a.md")]).unwrap();
    assert_eq!(names(&report.removed), set(&["tags/web.tag"]));
    assert!(!fx.output("tags/web.html").exists());
    assert!(site.page(Path::new("tags/web.tag")).is_none());

    // Removing a post rebuilds the tag page that listed it.
    let b = fx.source("posts/b.md");
    fs::remove_file(&b).unwrap();
    let report = rebuild(&mut site, &[b]).unwrap();
    assert!(report.built.contains(&PathBuf::from("tags/rust.tag")));
    assert!(!fx.read_output("tags/rust.html").contains("/posts/b.html"));
    assert!(!fx.output("posts/b.html").exists());
}

const BLOG: &str = r#"
    [[rule]]
    pattern = "templates/*"
    processors = ["ignore"]

    [[rule]]
    pattern = "blog/index.md"
    processors = ["paginate 3 blog/p*.md", "template templates/list.html"]
    dest = "blog/index.html"

    [[rule]]
    pattern = "*.md"
    processors = ["markdown"]
    dest = "{dir}/{stem}.html"
"#;

fn blog_fixture(posts: usize) -> Fixture {
    let names: Vec<String> = (1..=posts).map(|i| format!("blog/p{i}.md")).collect();
    let mut files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "post")).collect();
    files.push(("blog/index.md", "Archive"));
    files.push((
        "templates/list.html",
        "{{ paginator.index }}/{{ paginator.total }}\n{{ pages }}",
    ));
    Fixture::new(BLOG, &files)
}

#[test]
fn test_pagination_writes_one_file_per_group() {
    let fx = blog_fixture(7);
    let mut site = fx.site();
    let report = render(&mut site).unwrap();
    assert!(report.is_success());

    assert!(fx.read_output("blog/index.html").starts_with("1/3\n"));
    assert!(fx.read_output("blog/index-2.html").starts_with("2/3\n"));
    let last = fx.read_output("blog/index-3.html");
    assert!(last.starts_with("3/3\n"));
    assert!(last.contains("/blog/p7.html"));
    assert!(!last.contains("/blog/p6.html"));
    assert!(!fx.output("blog/index-4.html").exists());

    let origin = site.page(Path::new("blog/index.md")).unwrap();
    assert!(origin.ignored);
    assert!(origin.written.is_none());
}

#[test]
fn test_new_post_joins_collection() {
    let fx = blog_fixture(7);
    let mut site = fx.site();
    render(&mut site).unwrap();

    fx.write("blog/p8.md", "post");
    let report = rebuild(&mut site, &[fx.source("blog/p8.md")]).unwrap();
    assert!(report.is_success());
    assert!(report.built.contains(&PathBuf::from("blog/index.md")));
    assert!(fx.read_output("blog/index-3.html").contains("/blog/p8.html"));
    assert!(fx.output("blog/p8.html").exists());
}

#[test]
fn test_shrinking_collection_drops_last_group() {
    let fx = blog_fixture(7);
    let mut site = fx.site();
    render(&mut site).unwrap();

    let p7 = fx.source("blog/p7.md");
    fs::remove_file(&p7).unwrap();
    let report = rebuild(&mut site, &[p7]).unwrap();
    assert!(report.is_success());
    assert!(report.removed.contains(&PathBuf::from("blog/index.md#3")));
    assert!(!fx.output("blog/index-3.html").exists());
    assert!(fx.read_output("blog/index-2.html").starts_with("2/2\n"));
}

const LISTING: &str = r#"
    [[rule]]
    pattern = "templates/*"
    processors = ["ignore"]

    [[rule]]
    pattern = "blog/index.md"
    processors = ["paginate 1 posts/*.md", "template templates/list.html"]
    dest = "blog/index.html"

    [[rule]]
    pattern = "index.md"
    processors = ["collect posts/*.md", "template templates/list.html"]
    dest = "index.html"

    [[rule]]
    pattern = "posts/*.md"
    processors = ["config", "markdown", "directorify"]
    dest = "{dir}/{stem}.html"
"#;

fn listing_fixture() -> Fixture {
    Fixture::new(
        LISTING,
        &[
            ("templates/list.html", "{{ pages }}"),
            ("index.md", ""),
            ("blog/index.md", ""),
            ("posts/a.md", "title: Alpha\n----\nA"),
            ("posts/b.md", "title: Beta\n----\nB"),
        ],
    )
}

#[test]
fn test_listing_sees_processed_pages_on_full_build() {
    let fx = listing_fixture();
    let mut site = fx.site();

    let report = render(&mut site).unwrap();
    assert!(report.is_success());
    let index = fx.read_output("index.html");
    assert_eq!(
        index,
        "<ul>\n<li><a href=\"/posts/a/\">Alpha</a></li>\n<li><a href=\"/posts/b/\">Beta</a></li>\n</ul>"
    );
    assert!(fx.read_output("blog/index.html").contains("<a href=\"/posts/a/\">Alpha</a>"));
    assert!(fx.read_output("blog/index-2.html").contains("<a href=\"/posts/b/\">Beta</a>"));

    let second = render(&mut site).unwrap();
    assert!(second.built.is_empty());

    // An edit that keeps title and URL leaves the listing byte-identical.
    fx.write("posts/a.md", "title: Alpha\n----\nA, edited");
    let report = rebuild(&mut site, &[fx.source("posts/a.md")]).unwrap();
    assert!(report.built.contains(&PathBuf::from("index.md")));
    assert_eq!(fx.read_output("index.html"), index);
}

#[test]
fn test_full_build_is_reproducible() {
    let fx = listing_fixture();
    render(&mut fx.site()).unwrap();
    let index = fx.read_output("index.html");
    let blog = fx.read_output("blog/index.html");

    let report = render(&mut fx.site()).unwrap();
    assert!(report.is_success());
    assert_eq!(report.written, 0);
    assert_eq!(fx.read_output("index.html"), index);
    assert_eq!(fx.read_output("blog/index.html"), blog);
}
