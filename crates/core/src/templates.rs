use crate::error::CardError;
use crate::forms;
use crate::models::{SlotMap, SlotType, SlotValue, TemplateId};
use crate::registry::{SlotRule, SlotSpec, TemplateDefinition, TriggerDescriptor};

pub const SEVERITIES: &[&str] = &["low", "medium", "high"];
pub const WHEN: &[&str] = &["today", "tonight", "tomorrow", "weekend"];
pub const POPUP_TOOLS: &[&str] = &["calendar", "city_picker", "checklist", "settings"];

pub const DEFAULT_FORM_FIELDS: &[&str] = &["name", "date", "comment"];

pub fn catalogue() -> Result<Vec<TemplateDefinition>, CardError> {
    Ok(vec![
        hero(),
        alert(),
        data_summary()?,
        form(),
        list()?,
        simple(),
        flight_update()?,
        weather()?,
        stock_update()?,
        restaurant_details(),
        popup_action(),
    ])
}

fn shape(
    template: TemplateId,
    name: &'static str,
    pattern: &str,
    context: &'static [&'static str],
    weight: f32,
) -> Result<TriggerDescriptor, CardError> {
    TriggerDescriptor::shape(name, pattern, context, weight)
        .map_err(|err| CardError::invalid(template, format!("shape {name}: {err}")))
}

fn hero() -> TemplateDefinition {
    TemplateDefinition::new(TemplateId::Hero)
        .trigger(TriggerDescriptor::phrases(
            &[
                "who are you",
                "what can you do",
                "introduce yourself",
                "welcome",
            ],
            0.9,
        ))
        // greetings alone stay low band so "hi, <request>" routes on the request
        .trigger(TriggerDescriptor::topic(&[
            "hi",
            "hello",
            "hey",
            "greetings",
            "good morning",
            "good afternoon",
            "good evening",
            "assistant",
            "bot",
            "capabilities",
            "introduce",
            "yourself",
            "help",
        ]))
        .slot(SlotSpec::optional("topic", SlotType::Text, SlotRule::HeroTopic))
        .slot(
            SlotSpec::optional("title", SlotType::Text, SlotRule::HeroTitle)
                .with_default("Hello! I'm your card assistant"),
        )
        .slot(
            SlotSpec::optional("description", SlotType::Text, SlotRule::Derived).with_default(
                "I turn requests into cards: alerts, reports, forms, lists, flights, weather, stocks, restaurants and quick actions.",
            ),
        )
        .slot(
            SlotSpec::optional("imageUrl", SlotType::Text, SlotRule::Derived)
                .with_default("https://adaptivecards.io/content/cats/1.png"),
        )
        .slot(
            SlotSpec::optional("url", SlotType::Text, SlotRule::Derived)
                .with_default("https://adaptivecards.io"),
        )
}

fn alert() -> TemplateDefinition {
    TemplateDefinition::new(TemplateId::Alert)
        .trigger(TriggerDescriptor::phrases(
            &[
                "alert",
                "alarm",
                "critical",
                "emergency",
                "urgent",
                "overheating",
                "overheated",
                "on fire",
                "outage",
                "crashed",
                "crashing",
                "failed",
                "failure",
                "failing",
                "error",
                "breach",
                "is down",
                "went down",
            ],
            0.9,
        ))
        .trigger(TriggerDescriptor::topic(&[
            "system",
            "server",
            "cpu",
            "disk",
            "memory",
            "module",
            "service",
            "incident",
            "warning",
            "degraded",
            "hot",
        ]))
        .slot(SlotSpec::required("detail", SlotType::Text, SlotRule::Utterance))
        .slot(
            SlotSpec::optional("severity", SlotType::Enum(SEVERITIES), SlotRule::Severity)
                .with_default("medium"),
        )
        .slot(SlotSpec::optional("component", SlotType::Text, SlotRule::Component))
        .slot(SlotSpec::optional("value", SlotType::Number, SlotRule::Measurement))
}

fn data_summary() -> Result<TemplateDefinition, CardError> {
    Ok(TemplateDefinition::new(TemplateId::DataSummary)
        .trigger(TriggerDescriptor::phrases(
            &[
                "report",
                "summary",
                "dashboard",
                "metrics",
                "analytics",
                "statistics",
                "stats",
                "kpi",
                "kpis",
                "sales",
                "revenue",
                "breakdown",
            ],
            0.85,
        ))
        .trigger(shape(
            TemplateId::DataSummary,
            "fiscal_quarter",
            r"(?i)\bQ[1-4]\b",
            &["numbers", "results", "performance", "figures", "totals"],
            0.6,
        )?)
        .trigger(TriggerDescriptor::topic(&[
            "quarter",
            "quarterly",
            "total",
            "trend",
            "growth",
            "numbers",
            "performance",
            "results",
            "figures",
            "year",
        ]))
        .slot(
            SlotSpec::required("title", SlotType::Text, SlotRule::ReportTitle).carried(),
        )
        .slot(SlotSpec::optional("period", SlotType::Text, SlotRule::Period).carried())
        .slot(SlotSpec::optional("total", SlotType::Number, SlotRule::Amount))
        .slot(
            SlotSpec::optional("trend", SlotType::Text, SlotRule::Trend).with_default("Stable"),
        ))
}

fn form() -> TemplateDefinition {
    TemplateDefinition::new(TemplateId::Form)
        .trigger(TriggerDescriptor::phrases(
            &[
                "feedback",
                "form",
                "survey",
                "questionnaire",
                "sign up",
                "signup",
                "register",
                "registration",
                "fill out",
                "fill in",
                "application",
            ],
            0.9,
        ))
        .trigger(TriggerDescriptor::topic(&[
            "submit",
            "comment",
            "comments",
            "opinion",
            "rate",
            "review",
            "input",
            "fields",
            "apply",
        ]))
        .slot(
            SlotSpec::optional("title", SlotType::Text, SlotRule::FormTitle)
                .with_default("Feedback Form"),
        )
        .slot(SlotSpec::optional("subject", SlotType::Text, SlotRule::FormSubject))
        .slot(
            SlotSpec::optional("fields", SlotType::List, SlotRule::FormFields).with_default(
                DEFAULT_FORM_FIELDS
                    .iter()
                    .map(|field| field.to_string())
                    .collect::<Vec<_>>(),
            ),
        )
        .slot(SlotSpec::optional("formId", SlotType::Text, SlotRule::Derived))
        .render_with(finish_form)
}

fn list() -> Result<TemplateDefinition, CardError> {
    Ok(TemplateDefinition::new(TemplateId::List)
        .trigger(TriggerDescriptor::phrases(
            &[
                "tasks",
                "task",
                "to do",
                "todo",
                "todos",
                "to do list",
                "list",
                "priorities",
                "reminders",
                "errands",
            ],
            0.85,
        ))
        .trigger(shape(
            TemplateId::List,
            "top_n",
            r"(?i)\btop\s+\d{1,2}\b",
            &[],
            0.6,
        )?)
        .trigger(TriggerDescriptor::topic(&[
            "items",
            "agenda",
            "things",
            "pending",
            "backlog",
            "queue",
        ]))
        .slot(
            SlotSpec::optional("title", SlotType::Text, SlotRule::ListTitle)
                .with_default("Item List"),
        )
        .slot(SlotSpec::optional("count", SlotType::Number, SlotRule::Count))
        .slot(SlotSpec::optional("items", SlotType::List, SlotRule::ListItems))
        .render_with(finish_list))
}

fn simple() -> TemplateDefinition {
    TemplateDefinition::new(TemplateId::Simple)
        .trigger(TriggerDescriptor::phrases(
            &[
                "status update",
                "message",
                "tell me",
                "say",
                "note",
                "fyi",
                "announce",
                "announcement",
                "just saying",
            ],
            0.8,
        ))
        .trigger(TriggerDescriptor::topic(&[
            "update",
            "info",
            "information",
            "text",
            "remind",
            "notify",
        ]))
        .slot(
            SlotSpec::optional("message", SlotType::Text, SlotRule::Utterance)
                .with_default("Content"),
        )
}

fn flight_update() -> Result<TemplateDefinition, CardError> {
    Ok(TemplateDefinition::new(TemplateId::FlightUpdate)
        .trigger(TriggerDescriptor::phrases(
            &["flight", "flights", "boarding pass", "departure gate", "layover"],
            0.9,
        ))
        .trigger(shape(
            TemplateId::FlightUpdate,
            "flight_number",
            r"\b(?:[A-Z]{2}|[A-Z][0-9]|[0-9][A-Z])[0-9]{1,4}\b",
            &[],
            0.7,
        )?)
        .trigger(TriggerDescriptor::topic(&[
            "gate",
            "boarding",
            "departure",
            "arrival",
            "airport",
            "airline",
            "plane",
            "delayed",
            "landing",
            "takeoff",
        ]))
        .slot(
            SlotSpec::required("flightNumber", SlotType::Identifier, SlotRule::FlightNumber)
                .carried(),
        )
        .slot(SlotSpec::required("status", SlotType::Text, SlotRule::Live))
        .slot(SlotSpec::optional("gate", SlotType::Text, SlotRule::Live).with_default("TBD"))
        .slot(SlotSpec::optional("passenger", SlotType::Text, SlotRule::Live))
        .slot(SlotSpec::optional("boardingTime", SlotType::Text, SlotRule::Live))
        .slot(SlotSpec::optional("route", SlotType::Text, SlotRule::Live)))
}

fn weather() -> Result<TemplateDefinition, CardError> {
    Ok(TemplateDefinition::new(TemplateId::Weather)
        .trigger(TriggerDescriptor::phrases(
            &[
                "weather",
                "forecast",
                "temperature outside",
                "raining",
                "snowing",
                "umbrella",
                "humidity",
            ],
            0.9,
        ))
        .trigger(shape(
            TemplateId::Weather,
            "place_with_weather_verb",
            r"\b(?:in|at|for)\s+[A-Z][a-z]+",
            &["rain", "snow", "sunny", "cold", "hot", "warm", "windy", "degrees"],
            0.7,
        )?)
        .trigger(TriggerDescriptor::topic(&[
            "sunny",
            "rain",
            "snow",
            "wind",
            "cold",
            "warm",
            "outside",
            "degrees",
            "climate",
            "city",
        ]))
        .slot(SlotSpec::required("city", SlotType::Text, SlotRule::Place).carried())
        .slot(SlotSpec::optional("date", SlotType::Date, SlotRule::IsoDate))
        .slot(SlotSpec::optional("when", SlotType::Enum(WHEN), SlotRule::When))
        .slot(SlotSpec::required("temperature", SlotType::Number, SlotRule::Live))
        .slot(SlotSpec::required("condition", SlotType::Text, SlotRule::Live))
        .slot(SlotSpec::optional("high", SlotType::Number, SlotRule::Live))
        .slot(SlotSpec::optional("low", SlotType::Number, SlotRule::Live))
        .slot(SlotSpec::optional("wind", SlotType::Text, SlotRule::Live))
        .slot(
            SlotSpec::optional("iconUrl", SlotType::Text, SlotRule::Live)
                .with_default("https://openweathermap.org/img/wn/10d@2x.png"),
        ))
}

fn stock_update() -> Result<TemplateDefinition, CardError> {
    Ok(TemplateDefinition::new(TemplateId::StockUpdate)
        .trigger(TriggerDescriptor::phrases(
            &[
                "stock",
                "stocks",
                "stock price",
                "share price",
                "shares",
                "ticker",
                "quote",
                "nasdaq",
                "nyse",
                "market",
            ],
            0.9,
        ))
        .trigger(shape(
            TemplateId::StockUpdate,
            "cashtag",
            r"\$[A-Za-z]{1,5}\b",
            &[],
            0.75,
        )?)
        .trigger(TriggerDescriptor::topic(&[
            "price",
            "invest",
            "investing",
            "portfolio",
            "dividend",
            "earnings",
            "trading",
        ]))
        .slot(SlotSpec::required("symbol", SlotType::Identifier, SlotRule::Ticker).carried())
        .slot(SlotSpec::required("price", SlotType::Number, SlotRule::Live))
        .slot(SlotSpec::optional("change", SlotType::Number, SlotRule::Live))
        .slot(SlotSpec::optional("changePoints", SlotType::Number, SlotRule::Live))
        .slot(SlotSpec::optional(
            "direction",
            SlotType::Enum(&["up", "down"]),
            SlotRule::Derived,
        ))
        .render_with(finish_stock))
}

fn restaurant_details() -> TemplateDefinition {
    TemplateDefinition::new(TemplateId::RestaurantDetails)
        .trigger(TriggerDescriptor::phrases(
            &[
                "restaurant",
                "restaurants",
                "place to eat",
                "where to eat",
                "somewhere to eat",
                "book a table",
                "dinner",
                "lunch",
                "brunch",
            ],
            0.9,
        ))
        .trigger(TriggerDescriptor::topic(&[
            "food",
            "eat",
            "hungry",
            "cuisine",
            "menu",
            "nearby",
            "sushi",
            "pizza",
            "tacos",
            "burger",
        ]))
        .slot(SlotSpec::required("query", SlotType::Text, SlotRule::RestaurantQuery))
        .slot(SlotSpec::optional("cuisine", SlotType::Text, SlotRule::Cuisine).carried())
        .slot(SlotSpec::required("name", SlotType::Text, SlotRule::Live))
        .slot(SlotSpec::optional("rating", SlotType::Number, SlotRule::Live))
        .slot(SlotSpec::optional("reviews", SlotType::Number, SlotRule::Live))
        .slot(SlotSpec::optional("price", SlotType::Text, SlotRule::Live))
        .slot(SlotSpec::optional("address", SlotType::Text, SlotRule::Live))
        .slot(SlotSpec::optional("imageUrl", SlotType::Text, SlotRule::Live))
        .slot(SlotSpec::optional("url", SlotType::Text, SlotRule::Live))
        .slot(SlotSpec::optional("menuUrl", SlotType::Text, SlotRule::Live))
}

fn popup_action() -> TemplateDefinition {
    TemplateDefinition::new(TemplateId::PopupAction)
        .trigger(TriggerDescriptor::phrases(
            &[
                "open the",
                "open my",
                "launch",
                "pop up",
                "popup",
                "calendar",
                "checklist",
                "select a city",
                "pick a city",
                "choose a city",
                "city picker",
                "settings",
            ],
            0.9,
        ))
        .trigger(TriggerDescriptor::topic(&[
            "open",
            "show",
            "picker",
            "select",
            "choose",
            "tool",
            "menu",
        ]))
        .slot(SlotSpec::required("tool", SlotType::Enum(POPUP_TOOLS), SlotRule::PopupTool))
        .slot(
            SlotSpec::optional("title", SlotType::Text, SlotRule::PopupTitle)
                .with_default("Quick Action"),
        )
        .slot(SlotSpec::optional("text", SlotType::Text, SlotRule::PopupText))
        .slot(
            SlotSpec::optional("buttonTitle", SlotType::Text, SlotRule::PopupButton)
                .with_default("Open"),
        )
        .slot(
            SlotSpec::optional("url", SlotType::Text, SlotRule::Derived)
                .with_default("https://adaptivecards.io"),
        )
}

fn finish_form(slots: &mut SlotMap) {
    let title = slots
        .get("title")
        .map(SlotValue::display)
        .unwrap_or_default();
    let fields = slots
        .get("fields")
        .and_then(SlotValue::as_list)
        .map(<[String]>::to_vec)
        .unwrap_or_default();

    slots.insert(
        "formId".to_string(),
        SlotValue::Text(forms::form_id(&title, &fields)),
    );
}

fn finish_list(slots: &mut SlotMap) {
    if slots.contains_key("count") {
        return;
    }

    if let Some(len) = slots.get("items").and_then(SlotValue::as_list).map(<[String]>::len) {
        slots.insert("count".to_string(), SlotValue::Number(len as f64));
    }
}

fn finish_stock(slots: &mut SlotMap) {
    let change = slots
        .get("change")
        .and_then(SlotValue::as_number)
        .unwrap_or(0.0);
    let direction = if change >= 0.0 { "up" } else { "down" };
    slots.insert("direction".to_string(), SlotValue::from(direction));
}
