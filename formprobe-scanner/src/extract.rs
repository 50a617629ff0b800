// Markup extraction: links, forms, free-standing fields and frame sources

use crate::result::{Field, Form, Method};
use crate::scope::resolve_href;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const FIELD_TAGS: &str = "input, textarea, select, button";

/// Every `<a href>` in the document, resolved against `page`.
pub fn extract_links(html: &str, page: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]").unwrap();

    document
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_href(page, href))
        .collect()
}

/// Forms (possibly empty) and named fields that sit outside any form.
pub fn extract_forms(html: &str, page: &Url) -> (Vec<Form>, Vec<Field>) {
    let document = Html::parse_document(html);
    let form_selector = Selector::parse("form").unwrap();
    let field_selector = Selector::parse(FIELD_TAGS).unwrap();

    let forms = document
        .select(&form_selector)
        .map(|form| {
            let action = form
                .value()
                .attr("action")
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .and_then(|a| page.join(a).ok())
                .unwrap_or_else(|| page.clone());
            let method = Method::from_attr(form.value().attr("method"));
            let fields = form.select(&field_selector).filter_map(to_field).collect();

            Form::new(action.to_string(), method, fields)
        })
        .collect();

    let independent = document
        .select(&field_selector)
        .filter(|element| !inside_form(element))
        .filter_map(to_field)
        .collect();

    (forms, independent)
}

/// `src` of every iframe/frame, resolved against `page`.
pub fn extract_frame_sources(html: &str, page: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let frame_selector = Selector::parse("iframe[src], frame[src]").unwrap();

    document
        .select(&frame_selector)
        .filter_map(|element| element.value().attr("src"))
        .filter_map(|src| resolve_href(page, src))
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .collect()
}

fn to_field(element: ElementRef<'_>) -> Option<Field> {
    let value = element.value();
    Field::new(value.name(), value.attr("type"), value.attr("name"))
}

fn inside_form(element: &ElementRef<'_>) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| e.name() == "form")
    })
}
