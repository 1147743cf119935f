//! Adaptive Card 1.5 documents for rendered payloads.
//!
//! Layout only: every value shown comes from the payload slots, so the same
//! payload always yields the same document.

use serde_json::{json, Value};

use crate::forms::field_from_name;
use crate::models::{CardPayload, CardStatus, FormFieldKind, SlotValue, TemplateId};

const SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const VERSION: &str = "1.5";

pub fn to_adaptive_card(payload: &CardPayload) -> Value {
    if payload.status == CardStatus::Fallback {
        return error_card(payload);
    }

    let view = View(payload);
    match payload.template_id {
        TemplateId::Hero => hero(&view),
        TemplateId::Alert => alert(&view),
        TemplateId::DataSummary => data_summary(&view),
        TemplateId::Form => form(&view),
        TemplateId::List => list(&view),
        TemplateId::Simple => simple(&view),
        TemplateId::FlightUpdate => flight_update(&view),
        TemplateId::Weather => weather(&view),
        TemplateId::StockUpdate => stock_update(&view),
        TemplateId::RestaurantDetails => restaurant_details(&view),
        TemplateId::PopupAction => popup_action(&view),
        TemplateId::Unrecognized => error_card(payload),
    }
}

struct View<'a>(&'a CardPayload);

impl View<'_> {
    fn text(&self, name: &str, default: &str) -> String {
        self.0
            .slot(name)
            .map(SlotValue::display)
            .unwrap_or_else(|| default.to_string())
    }

    fn number(&self, name: &str) -> Option<f64> {
        self.0.slot(name).and_then(SlotValue::as_number)
    }

    fn list(&self, name: &str) -> Vec<String> {
        self.0
            .slot(name)
            .and_then(SlotValue::as_list)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }
}

fn card(body: Vec<Value>, actions: Vec<Value>) -> Value {
    let mut document = json!({
        "type": "AdaptiveCard",
        "$schema": SCHEMA,
        "version": VERSION,
        "body": body,
    });
    if !actions.is_empty() {
        document["actions"] = Value::Array(actions);
    }
    document
}

fn heading(text: &str) -> Value {
    json!({ "type": "TextBlock", "text": text, "size": "Medium", "weight": "Bolder" })
}

fn accent_heading(text: &str) -> Value {
    json!({
        "type": "TextBlock",
        "text": text,
        "size": "Medium",
        "weight": "Bolder",
        "color": "Accent"
    })
}

fn paragraph(text: &str) -> Value {
    json!({ "type": "TextBlock", "text": text, "wrap": true })
}

fn fact(title: &str, value: String) -> Value {
    json!({ "title": title, "value": value })
}

fn open_url(title: &str, url: String) -> Value {
    json!({ "type": "Action.OpenUrl", "title": title, "url": url })
}

fn hero(view: &View) -> Value {
    card(
        vec![json!({
            "type": "Container",
            "items": [
                {
                    "type": "Image",
                    "url": view.text("imageUrl", "https://adaptivecards.io/content/cats/1.png"),
                    "size": "Stretch",
                    "altText": "Hero Image"
                },
                {
                    "type": "TextBlock",
                    "text": view.text("title", "Hero Card"),
                    "weight": "Bolder",
                    "size": "Large"
                },
                paragraph(&view.text("description", ""))
            ]
        })],
        vec![open_url("Learn More", view.text("url", "https://adaptivecards.io"))],
    )
}

fn alert(view: &View) -> Value {
    let severity = view.text("severity", "medium");
    let color = match severity.as_str() {
        "low" => "Good",
        "medium" => "Warning",
        _ => "Attention",
    };

    let mut facts = vec![fact("Severity:", crate::intent::title_case(&severity))];
    if let Some(component) = view.0.text("component") {
        facts.push(fact("Component:", component.to_string()));
    }
    if view.number("value").is_some() {
        facts.push(fact("Value:", view.text("value", "")));
    }

    let actions = if severity == "low" {
        Vec::new()
    } else {
        vec![json!({
            "type": "Action.Submit",
            "title": "Acknowledge",
            "data": { "action": "acknowledge" }
        })]
    };

    card(
        vec![
            json!({
                "type": "TextBlock",
                "text": format!("Status Alert: {}", severity.to_uppercase()),
                "weight": "Bolder",
                "size": "Medium",
                "color": color
            }),
            json!({ "type": "FactSet", "facts": facts }),
            paragraph(&view.text("detail", "No details provided.")),
        ],
        actions,
    )
}

fn data_summary(view: &View) -> Value {
    let mut facts = Vec::new();
    if view.0.slot("period").is_some() {
        facts.push(fact("Period:", view.text("period", "")));
    }
    if view.0.slot("total").is_some() {
        facts.push(fact("Total:", view.text("total", "")));
    }
    facts.push(fact("Trend:", view.text("trend", "Stable")));

    card(
        vec![
            heading(&view.text("title", "Data Summary")),
            json!({ "type": "FactSet", "facts": facts }),
        ],
        Vec::new(),
    )
}

fn form(view: &View) -> Value {
    let mut body = vec![heading(&view.text("title", "Feedback Form"))];
    if let Some(subject) = view.0.text("subject") {
        body.push(json!({ "type": "TextBlock", "text": subject, "isSubtle": true, "wrap": true }));
    }

    for name in view.list("fields") {
        let field = field_from_name(&name);
        if field.id.is_empty() {
            continue;
        }
        let mut input = match field.kind {
            FormFieldKind::Date => json!({ "type": "Input.Date", "id": field.id }),
            FormFieldKind::Number => json!({ "type": "Input.Number", "id": field.id }),
            FormFieldKind::Checkbox => json!({
                "type": "Input.Toggle",
                "id": field.id,
                "title": field.label
            }),
            FormFieldKind::Text => json!({
                "type": "Input.Text",
                "id": field.id,
                "placeholder": format!("Enter {}", field.label.to_lowercase()),
                "isMultiline": !field.required
            }),
        };
        input["label"] = json!(field.label);
        input["isRequired"] = json!(field.required);
        body.push(input);
    }

    card(
        body,
        vec![json!({
            "type": "Action.Submit",
            "title": "Submit",
            "data": {
                "action": "submit_form",
                "formId": view.text("formId", "")
            }
        })],
    )
}

fn list(view: &View) -> Value {
    let items = view
        .list("items")
        .into_iter()
        .map(|item| {
            json!({
                "type": "Container",
                "items": [{ "type": "TextBlock", "text": item, "weight": "Bolder" }],
                "separator": true
            })
        })
        .collect::<Vec<_>>();

    let mut body = vec![heading(&view.text("title", "Item List"))];
    if let Some(count) = view.number("count") {
        body.push(json!({
            "type": "TextBlock",
            "text": format!("{} items", crate::models::format_number(count)),
            "isSubtle": true,
            "spacing": "None"
        }));
    }
    body.push(json!({ "type": "Container", "items": items }));
    card(body, Vec::new())
}

fn simple(view: &View) -> Value {
    card(vec![paragraph(&view.text("message", "Content"))], Vec::new())
}

fn flight_update(view: &View) -> Value {
    let status = view.text("status", "Unknown");
    let status_color = if status.eq_ignore_ascii_case("on time") {
        "Good"
    } else {
        "Attention"
    };

    card(
        vec![
            accent_heading("Flight Update"),
            json!({
                "type": "ColumnSet",
                "columns": [
                    {
                        "type": "Column",
                        "width": "stretch",
                        "items": [
                            {
                                "type": "TextBlock",
                                "text": view.text("flightNumber", ""),
                                "size": "ExtraLarge",
                                "weight": "Bolder"
                            },
                            {
                                "type": "TextBlock",
                                "text": view.text("route", ""),
                                "isSubtle": true,
                                "spacing": "None"
                            }
                        ]
                    },
                    {
                        "type": "Column",
                        "width": "auto",
                        "items": [
                            { "type": "TextBlock", "text": status, "color": status_color, "weight": "Bolder" }
                        ]
                    }
                ]
            }),
            json!({
                "type": "FactSet",
                "facts": [
                    fact("Passenger:", view.text("passenger", "-")),
                    fact("Gate:", view.text("gate", "TBD")),
                    fact("Boarding:", view.text("boardingTime", "-"))
                ]
            }),
        ],
        vec![open_url("Check In", "https://www.united.com".to_string())],
    )
}

fn weather(view: &View) -> Value {
    let degrees = |name: &str| {
        view.0
            .slot(name)
            .map(|value| format!("{}°F", value.display()))
            .unwrap_or_else(|| "-".to_string())
    };

    let mut facts = vec![
        fact("High:", degrees("high")),
        fact("Low:", degrees("low")),
        fact("Wind:", view.text("wind", "-")),
    ];
    if view.0.slot("date").is_some() || view.0.slot("when").is_some() {
        let day = view
            .0
            .slot("date")
            .or_else(|| view.0.slot("when"))
            .map(SlotValue::display)
            .unwrap_or_default();
        facts.insert(0, fact("When:", crate::intent::title_case(&day)));
    }

    card(
        vec![
            heading(&format!("Weather in {}", view.text("city", "Unknown"))),
            json!({
                "type": "ColumnSet",
                "columns": [
                    {
                        "type": "Column",
                        "width": "auto",
                        "items": [
                            {
                                "type": "Image",
                                "url": view.text("iconUrl", "https://openweathermap.org/img/wn/10d@2x.png"),
                                "size": "Small"
                            }
                        ]
                    },
                    {
                        "type": "Column",
                        "width": "stretch",
                        "items": [
                            {
                                "type": "TextBlock",
                                "text": degrees("temperature"),
                                "size": "ExtraLarge",
                                "weight": "Lighter"
                            },
                            {
                                "type": "TextBlock",
                                "text": view.text("condition", ""),
                                "isSubtle": true,
                                "spacing": "None"
                            }
                        ]
                    }
                ]
            }),
            json!({ "type": "FactSet", "facts": facts }),
        ],
        Vec::new(),
    )
}

fn stock_update(view: &View) -> Value {
    let change = view.number("change").unwrap_or(0.0);
    let rising = view.text("direction", "up") == "up";
    let (arrow, color) = if rising { ("▲", "Good") } else { ("▼", "Attention") };
    let points = view
        .number("changePoints")
        .map(|points| format!("{points:.2}"))
        .unwrap_or_else(|| "0.00".to_string());

    card(
        vec![
            accent_heading("Market Update"),
            json!({
                "type": "Container",
                "items": [
                    {
                        "type": "TextBlock",
                        "text": view.text("symbol", ""),
                        "size": "Large",
                        "weight": "Bolder"
                    },
                    {
                        "type": "ColumnSet",
                        "columns": [
                            {
                                "type": "Column",
                                "width": "auto",
                                "items": [
                                    {
                                        "type": "TextBlock",
                                        "text": format!("${:.2}", view.number("price").unwrap_or(0.0)),
                                        "size": "ExtraLarge"
                                    }
                                ]
                            },
                            {
                                "type": "Column",
                                "width": "stretch",
                                "items": [
                                    {
                                        "type": "TextBlock",
                                        "text": format!("{arrow} {}% ({points})", crate::models::format_number(change.abs())),
                                        "color": color,
                                        "weight": "Bolder",
                                        "spacing": "Medium"
                                    }
                                ]
                            }
                        ]
                    }
                ]
            }),
        ],
        Vec::new(),
    )
}

fn restaurant_details(view: &View) -> Value {
    let rating = view.text("rating", "-");
    let reviews = view.text("reviews", "0");
    let cuisine = view.text("cuisine", "Restaurant");

    let mut actions = Vec::new();
    if let Some(url) = view.0.text("url") {
        actions.push(open_url("Book Table", url.to_string()));
    }
    if let Some(menu) = view.0.text("menuUrl") {
        actions.push(open_url("View Menu", menu.to_string()));
    }

    let mut body = Vec::new();
    if let Some(image) = view.0.text("imageUrl") {
        body.push(json!({
            "type": "Image",
            "url": image,
            "size": "Stretch",
            "altText": "Restaurant Image"
        }));
    }
    body.push(heading(&view.text("name", "Restaurant")));
    body.push(json!({
        "type": "ColumnSet",
        "columns": [
            {
                "type": "Column",
                "width": "auto",
                "items": [
                    { "type": "TextBlock", "text": format!("⭐ {rating} ({reviews})"), "isSubtle": true }
                ]
            },
            {
                "type": "Column",
                "width": "stretch",
                "items": [
                    {
                        "type": "TextBlock",
                        "text": format!("{cuisine} • {}", view.text("price", "$$")),
                        "isSubtle": true,
                        "horizontalAlignment": "Right"
                    }
                ]
            }
        ]
    }));
    if let Some(address) = view.0.text("address") {
        body.push(json!({ "type": "TextBlock", "text": address, "wrap": true, "isSubtle": true }));
    }

    card(body, actions)
}

fn popup_action(view: &View) -> Value {
    let tool = view.text("tool", "settings");
    let mut body = vec![heading(&view.text("title", "Quick Action"))];
    if let Some(text) = view.0.text("text") {
        body.push(paragraph(text));
    }

    card(
        body,
        vec![json!({
            "type": "Action.Submit",
            "title": view.text("buttonTitle", "Open"),
            "data": {
                "action": "open_popup",
                "tool": tool,
                "url": view.text("url", "https://adaptivecards.io")
            }
        })],
    )
}

fn error_card(payload: &CardPayload) -> Value {
    let view = View(payload);
    let requested = payload.text("requestedTemplate").unwrap_or("Simple");

    card(
        vec![
            heading("Adaptive Card Generation Error"),
            paragraph(&view.text("message", "Something went wrong.")),
        ],
        vec![json!({
            "type": "Action.Submit",
            "title": "Retry",
            "data": { "action": "retry", "template": requested }
        })],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlotMap;
    use crate::policy;

    fn payload(template_id: TemplateId, slots: &[(&str, SlotValue)]) -> CardPayload {
        CardPayload {
            template_id,
            status: CardStatus::Complete,
            slots: slots
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect::<SlotMap>(),
            notice: None,
        }
    }

    #[test]
    fn low_alerts_have_no_acknowledge_action() {
        let low = to_adaptive_card(&payload(
            TemplateId::Alert,
            &[("severity", "low".into()), ("detail", "disk at 70%".into())],
        ));
        assert!(low.get("actions").is_none());
        assert_eq!(low["body"][0]["color"], "Good");

        let high = to_adaptive_card(&payload(
            TemplateId::Alert,
            &[("severity", "high".into()), ("detail", "down".into())],
        ));
        assert_eq!(high["actions"][0]["title"], "Acknowledge");
    }

    #[test]
    fn stock_arrow_follows_direction() {
        let card = to_adaptive_card(&payload(
            TemplateId::StockUpdate,
            &[
                ("symbol", "MSFT".into()),
                ("price", SlotValue::Number(350.25)),
                ("change", SlotValue::Number(-1.25)),
                ("changePoints", SlotValue::Number(4.3)),
                ("direction", "down".into()),
            ],
        ));
        let change = &card["body"][1]["items"][1]["columns"][1]["items"][0];
        assert_eq!(change["text"], "▼ 1.25% (4.30)");
        assert_eq!(change["color"], "Attention");
    }

    #[test]
    fn form_inputs_follow_field_kinds() {
        let card = to_adaptive_card(&payload(
            TemplateId::Form,
            &[
                ("title", "Signup".into()),
                (
                    "fields",
                    SlotValue::List(vec!["name".to_string(), "start date".to_string()]),
                ),
                ("formId", "form-abc".into()),
            ],
        ));
        assert_eq!(card["body"][1]["type"], "Input.Text");
        assert_eq!(card["body"][2]["type"], "Input.Date");
        assert_eq!(card["body"][2]["id"], "start_date");
        assert_eq!(card["actions"][0]["data"]["formId"], "form-abc");
    }

    #[test]
    fn fallbacks_render_a_retry_card() {
        let fallback = policy::incomplete(TemplateId::Weather, &["city".to_string()]);
        let card = to_adaptive_card(&fallback);
        assert_eq!(card["body"][0]["text"], "Adaptive Card Generation Error");
        assert_eq!(card["actions"][0]["data"]["template"], "Weather");
    }
}
