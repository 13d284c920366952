use indoc::formatdoc;
use time::UtcOffset;

use super::{escape_html, render_error};
use crate::{
    models::{types::UtcDateTime, DayPhase, GameDay, GameDayId, Table, WantToPlay},
    utils::formatting::format_local,
};

/// What the planner shows: published game days, plus the tables and
/// want-to-play posts of the one day that is currently open.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlannerView {
    pub game_days: Vec<GameDay>,
    pub expanded: Option<GameDayId>,
    pub tables: Vec<Table>,
    pub wants: Vec<WantToPlay>,
    pub load_error: Option<String>,
}

/// The signed-in person looking at the planner.
#[derive(Clone, Copy, Debug)]
pub struct Viewer<'a> {
    pub uid: &'a str,
    pub is_admin: bool,
}

pub fn render_signed_out() -> String {
    r#"<div class="muted">Sign in to view game days.</div>"#.to_owned()
}

pub fn render_planner(
    view: &PlannerView,
    viewer: Viewer<'_>,
    now: UtcDateTime,
    offset: UtcOffset,
) -> String {
    if let Some(error) = &view.load_error {
        return render_error(&format!("Error loading gamedays: {error}"));
    }

    let mut upcoming: Vec<&GameDay> = view
        .game_days
        .iter()
        .filter(|day| day.phase(now) == DayPhase::Upcoming)
        .collect();
    // Undated days go last.
    upcoming.sort_by_key(|day| (day.starts_at.is_none(), day.starts_at));

    let mut archived: Vec<&GameDay> = view
        .game_days
        .iter()
        .filter(|day| day.phase(now) == DayPhase::Archived)
        .collect();
    archived.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));

    let context = Context {
        view,
        viewer,
        offset,
    };

    formatdoc! {
        r#"
            <div class="muted" style="margin-bottom:10px;">Click a Game Day to open its planner.</div>
            <div class="sectionTitle">📅 Upcoming</div>
            {upcoming}
            <div class="sectionTitle" style="margin-top:16px;">🗃️ Archive</div>
            <div class="muted">Read-only history of past game days.</div>
            {archived}"#,
        upcoming = context.day_cards(&upcoming, DayPhase::Upcoming),
        archived = context.day_cards(&archived, DayPhase::Archived),
    }
}

struct Context<'a> {
    view: &'a PlannerView,
    viewer: Viewer<'a>,
    offset: UtcOffset,
}

impl Context<'_> {
    fn day_cards(&self, days: &[&GameDay], phase: DayPhase) -> String {
        if days.is_empty() {
            let message = match phase {
                DayPhase::Upcoming => "No upcoming game days yet.",
                DayPhase::Archived => "No archived game days yet.",
            };
            return format!(r#"<div class="muted" style="margin:10px 0;">{message}</div>"#);
        }

        days.iter()
            .map(|day| self.day_card(day, phase))
            .collect::<Vec<String>>()
            .join("\n")
    }

    fn day_card(&self, day: &GameDay, phase: DayPhase) -> String {
        let id = escape_html(&day.id.0);
        let open = self.view.expanded.as_ref() == Some(&day.id);

        let delete_button = if phase == DayPhase::Upcoming && self.viewer.is_admin {
            format!(r#"<button class="btn btn-danger btnDelete" data-del="{id}">Delete</button>"#)
        } else {
            String::new()
        };

        let location = match &day.location {
            Some(location) if !location.is_empty() => format!(" • {}", escape_html(location)),
            _ => String::new(),
        };

        let body = if open {
            format!(
                r#"<div class="gamedayRowBody" id="open-{id}">{}</div>"#,
                self.open_planner(day, phase)
            )
        } else {
            String::new()
        };

        formatdoc! {
            r#"
                <div class="gamedayRow">
                  <div class="gamedayRowHead">
                    <div>
                      <div class="gamedayRowTitle">{title}</div>
                      <div class="muted">{starts_at}{location}</div>
                    </div>
                    <div class="gamedayRowBtns">
                      <button class="btn btnOpen" data-open="{id}">{toggle}</button>
                      {delete_button}
                    </div>
                  </div>
                  {body}
                </div>"#,
            title = escape_html(day.display_title()),
            starts_at = escape_html(&format_local(day.starts_at, self.offset)),
            toggle = if open { "Close" } else { "Open" },
        }
    }

    fn open_planner(&self, day: &GameDay, phase: DayPhase) -> String {
        let id = escape_html(&day.id.0);

        let actions = match phase {
            DayPhase::Archived => r#"<div class="muted">Archived (read-only)</div>"#.to_owned(),
            DayPhase::Upcoming => formatdoc! {
                r#"
                    <div class="actions" style="margin: 10px 0;">
                      <button class="btn btn-primary btnHost" data-host="{id}">➕ Host a Table</button>
                      <button class="btn btn-primary btnWant" data-want="{id}">🙋 Want to Play</button>
                      <button class="btn btn-secondary btnRefresh" data-refresh="{id}">🔄 Refresh</button>
                    </div>"#,
            },
        };

        let tables = if self.view.tables.is_empty() {
            r#"<div class="muted">No hosted tables yet.</div>"#.to_owned()
        } else {
            self.view
                .tables
                .iter()
                .map(|table| self.table_item(&id, table, phase))
                .collect::<Vec<String>>()
                .join(r#"<div class="hr"></div>"#)
        };

        let wants = if self.view.wants.is_empty() {
            r#"<div class="muted">No Want to Play posts yet.</div>"#.to_owned()
        } else {
            self.view
                .wants
                .iter()
                .map(want_item)
                .collect::<Vec<String>>()
                .join(r#"<div class="hr"></div>"#)
        };

        formatdoc! {
            r#"
                {actions}
                <div class="hr"></div>
                <h3>🎲 Hosted Tables</h3>
                {tables}
                <div class="hr"></div>
                <h3>🙋 Want to Play</h3>
                {wants}"#,
        }
    }

    fn table_item(&self, day_id: &str, table: &Table, phase: DayPhase) -> String {
        let table_id = escape_html(&table.id.0);

        let expansions = if table.expansion_names.is_empty() {
            "None".to_owned()
        } else {
            escape_html(&table.expansion_names.join(", "))
        };

        let buttons = match phase {
            DayPhase::Archived => String::new(),
            DayPhase::Upcoming => {
                let leave = if table.is_hosted_by(self.viewer.uid) {
                    "Leave (Host = Delete)"
                } else {
                    "Leave"
                };

                formatdoc! {
                    r#"
                        <div class="gamedayActions" style="margin-top:10px;">
                          <button class="btn" data-join="{day_id}:{table_id}">Join</button>
                          <button class="btn" data-leave="{day_id}:{table_id}">{leave}</button>
                        </div>"#,
                }
            }
        };

        formatdoc! {
            r#"
                <div class="tableItem">
                  {thumb}
                  <div class="tableMain">
                    <div class="tableTitle">{title}</div>
                    <div class="tableMeta">
                      👤 Host: <b>{host}</b> •
                      🕒 Start: <b>{start}</b> •
                      🎟 Seats: <b>{capacity}</b> ({open} open)
                    </div>
                    <div class="pills">
                      <span class="pill">🧩 Expansions: {expansions}</span>
                      <span class="pill">✅ Roster: {roster}</span>
                      <span class="pill">⏳ Waitlist: {waitlist}</span>
                    </div>{notes}
                    {buttons}
                  </div>
                </div>"#,
            thumb = thumbnail(table.thumb_url.as_deref()),
            title = game_link(table.game_name.as_deref(), table.bgg_url.as_deref()),
            host = escape_html(table.host_display_name.as_deref().unwrap_or("Unknown")),
            start = escape_html(&format_local(table.start_time, self.offset)),
            capacity = table.capacity,
            open = table.open_seats(),
            roster = name_list(&table.confirmed_names),
            waitlist = name_list(&table.waitlist_names),
            notes = match table.notes.as_deref() {
                Some(notes) if !notes.is_empty() => {
                    format!(r#"<div class="muted">{}</div>"#, escape_html(notes))
                }
                _ => String::new(),
            },
        }
    }
}

fn want_item(post: &WantToPlay) -> String {
    let notes = match post.notes.as_deref() {
        Some(notes) if !notes.is_empty() => format!(" • {}", escape_html(notes)),
        _ => String::new(),
    };

    formatdoc! {
        r#"
            <div class="tableItem">
              {thumb}
              <div class="tableMain">
                <div class="tableTitle">{title}</div>
                <div class="tableMeta">Requested by <b>{by}</b>{notes}</div>
              </div>
            </div>"#,
        thumb = thumbnail(post.thumb_url.as_deref()),
        title = game_link(post.game_name.as_deref(), post.bgg_url.as_deref()),
        by = escape_html(post.created_by_display_name.as_deref().unwrap_or("Unknown")),
    }
}

fn thumbnail(url: Option<&str>) -> String {
    match url {
        Some(url) if !url.is_empty() => {
            format!(r#"<img class="thumb" src="{}" alt="">"#, escape_html(url))
        }
        _ => r#"<div class="thumb"></div>"#.to_owned(),
    }
}

fn game_link(name: Option<&str>, url: Option<&str>) -> String {
    let title = escape_html(name.unwrap_or("Unknown Game"));

    match url {
        Some(url) if !url.is_empty() => format!(
            r#"<a href="{}" target="_blank" rel="noopener">{title}</a>"#,
            escape_html(url)
        ),
        _ => title,
    }
}

fn name_list(names: &[String]) -> String {
    if names.is_empty() {
        "—".to_owned()
    } else {
        escape_html(&names.join(", "))
    }
}
