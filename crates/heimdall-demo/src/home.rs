//! Playground actions: one per client trigger kind.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use chrono::{Days, Local};
use heimdall_core::Html;
use heimdall_core::html::escape;
use heimdall_server::{ActionRegistry, Payload, RegistrationError, Service};
use rand::Rng;
use serde::Deserialize;

const SUMMARIES: [&str; 10] = [
    "Freezing", "Bracing", "Chilly", "Cool", "Mild", "Warm", "Balmy", "Hot", "Sweltering",
    "Scorching",
];

/// Server-owned counter shared by every visitor.
#[derive(Debug, Default)]
pub struct Counter(AtomicI64);

impl Counter {
    /// Current value.
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Apply `op` (`inc`, `dec`, `reset`; anything else reads) and return the new value.
    pub fn apply(&self, op: &str, step: i64) -> i64 {
        let step = step.max(1);
        match op.to_ascii_lowercase().as_str() {
            "inc" => self.0.fetch_add(step, Ordering::SeqCst) + step,
            "dec" => self.0.fetch_sub(step, Ordering::SeqCst) - step,
            "reset" => {
                self.0.store(0, Ordering::SeqCst);
                0
            }
            _ => self.get(),
        }
    }
}

/// When the process started, for the lazy stats card.
#[derive(Debug)]
pub struct Uptime(pub Instant);

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WeatherTableRequest {
    page: u32,
    page_size: u32,
    q: Option<String>,
}

impl Default for WeatherTableRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 5,
            q: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProfileSaveRequest {
    display_name: Option<String>,
    favorite_animal: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HoverCardRequest {
    topic: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ActivityMoreRequest {
    cursor: u32,
    batch: u32,
}

impl Default for ActivityMoreRequest {
    fn default() -> Self {
        Self { cursor: 0, batch: 10 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CounterOpRequest {
    op: Option<String>,
    step: i64,
}

impl Default for CounterOpRequest {
    fn default() -> Self {
        Self { op: None, step: 1 }
    }
}

/// Register the `Home.*` actions.
pub fn register(registry: &mut ActionRegistry) -> Result<(), RegistrationError> {
    let _ = registry
        .register_sync("Home.Title", || Html::raw("Heimdall"))?
        .register_sync("Home.Header", || {
            Html::raw("Playground: load • click • change • input • submit • keydown • blur • hover • visible • scroll")
        })?
        .register_sync("Home.WeatherTable", |Payload(req): Payload<WeatherTableRequest>| {
            weather_table(&req)
        })?
        .register_sync("Home.ProfileSave", |Payload(req): Payload<ProfileSaveRequest>| {
            profile_save(&req)
        })?
        .register_sync("Home.HoverCard", |Payload(req): Payload<HoverCardRequest>| {
            hover_card(&req)
        })?
        .register_sync("Home.LazyStats", |Service(uptime): Service<Uptime>| {
            lazy_stats(&uptime)
        })?
        .register_sync("Home.ActivityMore", |Payload(req): Payload<ActivityMoreRequest>| {
            activity_more(&req)
        })?
        .register_sync("Home.CounterShow", |Service(counter): Service<Counter>| {
            render_counter(counter.get())
        })?
        .register_sync(
            "Home.CounterOp",
            |Service(counter): Service<Counter>, Payload(req): Payload<CounterOpRequest>| {
                render_counter(counter.apply(req.op.as_deref().unwrap_or("get"), req.step))
            },
        )?;
    Ok(())
}

fn weather_table(req: &WeatherTableRequest) -> Html {
    let page = req.page.max(1);
    let page_size = req.page_size.clamp(1, 50);
    let offset = (page - 1) * page_size;

    let q = req.q.as_deref().unwrap_or("").trim();
    let needle = q.to_lowercase();
    let summaries: Vec<&str> = SUMMARIES
        .iter()
        .copied()
        .filter(|s| needle.is_empty() || s.to_lowercase().contains(&needle))
        .collect();
    if summaries.is_empty() {
        return Html::raw(format!(
            r#"<tr><td colspan="4" class="p-4 text-center text-muted">No results for <strong>{}</strong>.</td></tr>"#,
            escape(q)
        ));
    }

    let today = Local::now().date_naive();
    let mut rng = rand::rng();
    let mut rows = Html::empty();
    for i in offset + 1..=offset + page_size {
        let date = today.checked_add_days(Days::new(u64::from(i))).unwrap_or(today);
        let celsius: i32 = rng.random_range(-20..55);
        let fahrenheit = 32 + (f64::from(celsius) / 0.5556) as i32;
        let summary = summaries[rng.random_range(0..summaries.len())];
        rows = rows.append(format!(
            "<tr><td>{}</td><td>{celsius}</td><td>{fahrenheit}</td><td>{}</td></tr>\n",
            date.format("%m/%d/%Y"),
            escape(summary)
        ));
    }
    rows
}

fn profile_save(req: &ProfileSaveRequest) -> Html {
    let name = req.display_name.as_deref().unwrap_or("").trim();
    let animal = req.favorite_animal.as_deref().unwrap_or("").trim();
    if name.is_empty() && animal.is_empty() {
        return Html::raw(r#"<div class="text-muted">Nothing to save yet…</div>"#);
    }
    Html::raw(format!(
        r#"<div class="d-flex justify-content-between"><div><div class="fw-semibold">Saved</div><div class="small text-muted"><span class="me-2">name: <span class="fw-semibold">{}</span></span><span>animal: <span class="fw-semibold">{}</span></span></div></div><div class="small text-muted">{}</div></div>"#,
        escape(name),
        escape(animal),
        Local::now().format("%I:%M:%S %p")
    ))
}

fn hover_card(req: &HoverCardRequest) -> Html {
    let topic = req.topic.as_deref().unwrap_or("unknown").to_lowercase();
    let (title, body) = match topic.as_str() {
        "caching" => (
            "CSRF caching",
            "Heimdall caches the antiforgery token client-side and retries once if validation fails.",
        ),
        "csrf" => (
            "Antiforgery",
            "Requests include a RequestVerificationToken header and are retried once if invalid.",
        ),
        "swap" => (
            "Swap modes",
            "inner replaces content; outer replaces the node; beforeend/afterbegin append or prepend.",
        ),
        _ => (
            "Hover preview",
            "Hover triggers can fetch server HTML without writing custom JS.",
        ),
    };
    Html::raw(format!(
        r#"<div class="d-flex align-items-start justify-content-between gap-3"><div><div class="fw-semibold">{}</div><div class="text-muted small">{}</div></div><span class="badge text-bg-light border">topic: {}</span></div>"#,
        escape(title),
        escape(body),
        escape(&topic)
    ))
}

fn lazy_stats(uptime: &Uptime) -> Html {
    let secs = uptime.0.elapsed().as_secs();
    Html::raw(format!(
        r#"<div class="d-flex justify-content-between"><div><div class="fw-semibold">Lazy-loaded stats</div><div class="small text-muted">server time: <span class="fw-semibold">{}</span> uptime: <span class="fw-semibold">{:02}:{:02}:{:02}</span></div></div><span class="badge text-bg-success">visible trigger</span></div>"#,
        Local::now().format("%I:%M:%S %p"),
        secs / 3600,
        secs / 60 % 60,
        secs % 60
    ))
}

fn activity_more(req: &ActivityMoreRequest) -> Html {
    let batch = req.batch.clamp(1, 50);
    let now = Local::now().format("%I:%M:%S %p").to_string();
    let mut items = Html::empty();
    for idx in req.cursor + 1..=req.cursor + batch {
        items = items.append(format!(
            r#"<li class="list-group-item"><div class="fw-semibold">Event #{idx}</div><div class="small text-muted">Generated at {now}</div></li>
"#
        ));
    }
    // Read by the client to request the next page, then removed.
    items.append(format!(
        r#"<li class="d-none" data-next-cursor="{}"></li>"#,
        req.cursor + batch
    ))
}

fn render_counter(value: i64) -> Html {
    Html::raw(format!(
        r#"<div class="d-flex justify-content-between"><div class="fw-semibold fs-4" data-counter-value="{value}">{value}</div><div class="small text-muted">server-owned</div></div>"#
    ))
}
