//! 一覧ページのHTML生成

use std::fmt::Write;

use url::{form_urlencoded, Url};

use crate::store::{ProductPage, ProductRow};

use super::handlers::ListParams;
use super::launcher::JobStatus;

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// 現在のフィルタを維持したままページ番号だけ差し替えたクエリ文字列
fn page_link(params: &ListParams, page: u32) -> String {
    let mut qs = form_urlencoded::Serializer::new(String::new());
    let filters = [
        ("search", &params.search),
        ("topic", &params.topic),
        ("start_date", &params.start_date),
        ("end_date", &params.end_date),
        ("sort", &params.sort),
        ("order", &params.order),
        ("page_size", &params.page_size),
    ];
    for (key, value) in filters {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            qs.append_pair(key, v);
        }
    }
    qs.append_pair("page", &page.to_string());
    format!("/?{}", qs.finish())
}

fn input(name: &str, kind: &str, value: Option<&str>, placeholder: &str) -> String {
    format!(
        r#"<input type="{}" name="{}" value="{}" placeholder="{}">"#,
        kind,
        name,
        escape(value.unwrap_or_default()),
        placeholder
    )
}

/// http / https 以外 (javascript: 等) はリンクにしない
fn is_web_link(href: &str) -> bool {
    Url::parse(href).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

fn row_html(row: &ProductRow) -> String {
    let link = [row.website_url.as_deref(), row.url.as_deref()]
        .into_iter()
        .flatten()
        .find(|u| is_web_link(u));
    let name = match link {
        Some(href) => format!(
            r#"<a href="{}" rel="noopener noreferrer">{}</a>"#,
            escape(href),
            escape(&row.name)
        ),
        None => escape(&row.name),
    };
    let launch = row
        .launch_day()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    format!(
        "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        name,
        escape(row.tagline.as_deref().unwrap_or_default()),
        row.upvotes,
        launch,
        escape(&row.topics.join(", ")),
        escape(&row.maker_ids.join(", ")),
    )
}

fn status_html(status: &JobStatus) -> String {
    if let Some(job) = &status.running {
        return format!(
            "<p class=\"status\">Scrape #{} running ({} .. {})</p>",
            job.id, job.args.start_date, job.args.end_date
        );
    }
    match &status.last {
        Some(last) => format!(
            "<p class=\"status\">Last scrape #{} {} at {}</p>",
            last.job.id,
            if last.success { "succeeded" } else { "failed" },
            last.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => String::new(),
    }
}

pub(crate) fn products_page(page: &ProductPage, params: &ListParams, status: &JobStatus) -> String {
    let mut html = String::from(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>ProductHunt Launches</title>\
         <style>body{font-family:sans-serif;margin:2rem}table{border-collapse:collapse;width:100%}\
         td,th{border-bottom:1px solid #ddd;padding:.4rem;text-align:left}.num{text-align:right}\
         form{margin:.5rem 0}</style></head><body><h1>ProductHunt Launches</h1>",
    );

    let _ = write!(
        html,
        r#"<form method="get" action="/">{}{}{}{}<select name="sort">"#,
        input("search", "text", params.search.as_deref(), "search"),
        input("topic", "text", params.topic.as_deref(), "topic"),
        input("start_date", "date", params.start_date.as_deref(), "from"),
        input("end_date", "date", params.end_date.as_deref(), "to"),
    );
    for (value, label) in [("upvotes", "Upvotes"), ("launch_date", "Launch date"), ("name", "Name")] {
        let selected = if params.sort.as_deref() == Some(value) { " selected" } else { "" };
        let _ = write!(html, r#"<option value="{}"{}>{}</option>"#, value, selected, label);
    }
    html.push_str(r#"</select><button type="submit">Filter</button></form>"#);

    let _ = write!(
        html,
        r#"<form method="post" action="/scrape">{}{}<button type="submit">Re-scrape</button></form>{}"#,
        input("start_date", "date", None, "from"),
        input("end_date", "date", None, "to"),
        status_html(status)
    );

    let _ = write!(
        html,
        "<p>{} products</p><table><thead><tr><th>Name</th><th>Tagline</th><th>Upvotes</th>\
         <th>Launch date</th><th>Topics</th><th>Makers</th></tr></thead><tbody>",
        page.total
    );
    if page.items.is_empty() {
        html.push_str("<tr><td colspan=\"6\">No products found</td></tr>");
    }
    for row in &page.items {
        html.push_str(&row_html(row));
    }
    html.push_str("</tbody></table><nav>");

    if page.has_prev() {
        let _ = write!(html, r#"<a href="{}">Previous</a> "#, escape(&page_link(params, page.page - 1)));
    }
    let _ = write!(html, "Page {} of {}", page.page, page.total_pages().max(1));
    if page.has_next() {
        let _ = write!(html, r#" <a href="{}">Next</a>"#, escape(&page_link(params, page.page + 1)));
    }
    html.push_str("</nav></body></html>");
    html
}
