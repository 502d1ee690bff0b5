use newsletter_sources::{
    FeedPost, append_footer, clean_html_output, format_posts_for_prompt,
    load_recent_newsletters_for_prompt, save_newsletter,
};

#[test]
fn generated_issue_is_cleaned_archived_and_read_back() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let model_output = "Here you go:\n```html\n<html><body><h1>Daily</h1><p>Rust 1.93 ships.</p></body></html>\n```";

    let html = append_footer(
        &clean_html_output(model_output),
        "<footer>Unsubscribe</footer>",
    );
    assert!(html.starts_with("<html>"));
    assert!(html.ends_with("<footer>Unsubscribe</footer></body></html>"));

    let path = save_newsletter(tmp.path(), &html, "June 10, 2025").expect("save");
    assert!(path.ends_with("newsletter_June_10_2025.html"));

    let block = load_recent_newsletters_for_prompt(tmp.path(), 7).expect("load");
    assert!(block.starts_with("<recent_newsletters>"));
    assert!(block.contains("filename=\"newsletter_June_10_2025.html\""));
    assert!(block.contains("Rust 1.93 ships."));
    assert!(!block.contains("<h1>"));
    assert!(block.ends_with("</recent_newsletters>"));
}

#[test]
fn feed_block_lists_articles_per_source() {
    let post = FeedPost {
        title: "Release notes".into(),
        link: "https://blog.example.com/release".into(),
        published: None,
        content: "Everything changed.".into(),
        source: "Example Blog".into(),
    };
    let feeds = vec![
        ("Example Blog".to_string(), vec![post]),
        ("Quiet Blog".to_string(), Vec::new()),
    ];
    let block = format_posts_for_prompt(&feeds, 24);
    assert!(block.contains("<feed source=\"Example Blog\">"));
    assert!(block.contains("<title>Release notes</title>"));
    assert!(block.contains("<date>Unknown</date>"));
    assert!(block.contains("No posts from the last 24 hours."));
}
