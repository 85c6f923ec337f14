//! HTML for the map list.
use crate::access::{Row, Viewer};
use crate::catalog::WorldEntity;
use crate::metadata::DetailLevel;
use std::borrow::Cow;
use std::fmt::Write;
use std::time::SystemTime;

const WIKI_IMAGES: &str = "https://static.wikia.nocookie.net/minecraft_gamepedia/images";
const LOGO: &str = "0/09/Minecraft_Twitter_logo.jpeg";
const SPINNER: &str = "c/c0/End_Crystal_%28Slateless%29.gif";
const NO_THUMBNAIL: &str = "https://upload.wikimedia.org/wikipedia/commons/e/e1/No_sign2.svg";

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Minecraft maps from bedrock-viz</title>
<style>
body { background: #060606; color: #ffffffCC; font-size: 16px; font-family:sans-serif; }
a:link, a:visited { color: #00BB00; }
a:hover { color: #00EEFF; }
a:active { color: yellow; }
.row {
  display:flex; flex-wrap:wrap; align-items:center;
  border: 1px solid green; width:99%; padding:0.5em 1em 0.5em 1em;
}
.row .image {
  width:320px; height:180px; border:3px ridge silver;
  text-align:center; margin:0.5em 1em 0.5em 1em;
}
.row .image img {filter: brightness(95%)}
.row .desc { text-align:left; margin: 0.5em; }
.row .desc h2 { margin-top:0; }
form.mapaction { display:inline-block; font-size:larger; }
form.refresh { float:right; margin-right:2em; font-size:larger; }
form.mapaction input, form.mapaction select, form.refresh input {
  background:#BBDDCC; font-size:inherit;
}
form.mapaction div.private { border: 1px solid red; padding:0.1em; background:#550000; }
form.mapaction div.public { border: 1px solid #00FF00; padding:0.1em; background:#005500; }
.date { font-size: smaller; font-style:italic; }
.modal {
  display:none; align-content:center; position: fixed; z-index:1;
  left:0; top:0; width:100%; height:100%; background-color:rgba(6,6,6,0.5);
}
.modal-content { width:150px; height:180px; margin:auto; text-align:center; color:yellow; }
.modal-content img { display:inline-block; }
#footer p { font-size:smaller; text-align:center; }
</style>
<script>
function setscrollpos(form) { form.scrollpos.value = window.scrollY.toString(); return true; }
function spinner() { document.getElementById('spinner').style.display = 'flex'; }
function confirmdelete(form) {
  setscrollpos(form);
  return confirm('Confirm DELETE the map for "' + form.dataset.world + '".');
}
function confirmcreate(form) {
  setscrollpos(form);
  var act = form.dataset.replace === 'true' ? 'REPLACE map for ' : 'Create new map for ';
  if (confirm(act + form.dataset.world + '?')) { spinner(); return true; }
  return false;
}
</script>
</head>
<body>
<div id="content">"#;

/// Escapes text for use in element content and double-quoted attributes.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(|c| matches!(c, '&' | '<' | '>' | '"' | '\'')) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Escapes a single path segment for use in a link.
fn href_segment(segment: &str) -> Cow<'_, str> {
    let unreserved = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~');
    if segment.bytes().all(unreserved) {
        return Cow::Borrowed(segment);
    }
    let mut encoded = String::with_capacity(segment.len() * 3);
    for b in segment.bytes() {
        if unreserved(b) {
            encoded.push(b as char);
        } else {
            let _ = write!(encoded, "%{b:02X}");
        }
    }
    Cow::Owned(encoded)
}

fn timestamp(t: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(t).format("%a %b %e %Y %H:%M:%S %Z").to_string()
}

/// The whole list page. `scroll` is where the browser was before it posted
/// the form this page answers, so it can jump back there.
pub fn render(rows: &[Row<'_>], viewer: Viewer, scroll: u32) -> String {
    let mut html = String::with_capacity(4096 + rows.len() * 1536);
    html.push_str(HEAD);
    if viewer.may_mutate() {
        html.push_str(concat!(
            r#"<form class="refresh" action="/" method="POST" onsubmit="spinner();">"#,
            r#"<input type="hidden" name="op" value="refresh">"#,
            r#"<input type="submit" value="&#x1F504;&#xFE0F; Refresh world list" "#,
            r#"title="Click if you played Minecraft since starting the server">"#,
            "</form>"
        ));
    }
    let _ = writeln!(
        html,
        concat!(
            r#"<h1><img src="{images}/{logo}" style="width:40px; vertical-align:middle;" "#,
            r#"alt="[logo]"> <cite>Minecraft</cite> maps</h1>"#
        ),
        images = WIKI_IMAGES,
        logo = LOGO,
    );
    for row in rows {
        write_row(&mut html, row);
    }
    if rows.is_empty() {
        html.push_str("<p>No maps here yet!</p>\n");
    }
    let _ = write!(
        html,
        concat!(
            "\n</div>\n",
            r#"<div id="spinner" class="modal"><div class="modal-content">"#,
            r#"<img src="{images}/{spinner}" width="150" height="160" alt="[please wait]">"#,
            r#"<br>See console</div></div>"#,
            "\n<script>\nwindow.scrollTo(0,{scroll});\n</script>\n",
            r#"<div id="footer"><hr><p>GUI front end for "#,
            r#"<a href="https://github.com/bedrock-viz/bedrock-viz" target="_blank">"#,
            r#"bedrock-viz</a> "#,
            r#"<cite>Minecraft</cite> map viewer.</p>"#,
            r#"<p>Title and 'busy' graphic assets obtained from the "#,
            r#"<a href="https://minecraft.wiki/" target="_blank">Minecraft Wiki</a>.</p></div>"#,
            "\n</body>\n</html>\n"
        ),
        images = WIKI_IMAGES,
        spinner = SPINNER,
        scroll = scroll,
    );
    html
}

fn write_row(html: &mut String, row: &Row<'_>) {
    let world = row.entity;
    let name = escape(&world.display_name);
    let index = format!("{}/index.html", href_segment(&world.id));
    let image = if world.is_source_world_present {
        let id = href_segment(&world.id);
        format!(r#"<img src="/thumbnails/{id}.jpg" style="width:320px;" alt="[thumbnail]">"#)
    } else {
        format!(r#"<img src="{NO_THUMBNAIL}" style="width:180px;" alt="[no thumbnail]">"#)
    };

    let class = if world.has_rendered_map { " hasmap" } else { "" };
    let _ = write!(html, r#"<div class="row{class}"><div class="image">"#);
    if world.has_rendered_map {
        let _ = write!(html, r#"<a href="{index}">{image}</a>"#);
        let _ = write!(html, "</div>\n<div class=\"desc\">");
        let _ = write!(html, "<h2><a href=\"{index}\">{name}</a></h2>\n");
    } else {
        let _ = write!(html, "{image}</div>\n<div class=\"desc\"><h2>{name}</h2>\n");
    }
    if row.affordances.create {
        write_new_map_button(html, world);
    }
    match world.source_modified_at {
        Some(t) => {
            let _ = writeln!(html, r#"<p class="date">World updated: {}</p>"#, timestamp(t));
        }
        None => html.push_str("<p class=\"date\">World no longer exists</p>\n"),
    }
    if world.has_rendered_map {
        if let Some(t) = world.map_modified_at {
            let _ = writeln!(html, r#"<p class="date">Map updated: {}</p>"#, timestamp(t));
        }
    }
    if row.affordances.delete {
        write_delete_button(html, world);
    }
    if row.affordances.toggle_visibility {
        write_visibility_toggle(html, world);
    }
    html.push_str("</div>\n</div>\n");
}

fn hidden(html: &mut String, name: &str, value: &str) {
    let _ = write!(html, r#"<input type="hidden" name="{name}" value="{}">"#, escape(value));
}

fn write_delete_button(html: &mut String, world: &WorldEntity) {
    let _ = write!(
        html,
        concat!(
            r#"<form class="mapaction" method="post" action="/" data-world="{}" "#,
            r#"onsubmit="return confirmdelete(this);">"#
        ),
        escape(&world.display_name)
    );
    hidden(html, "mapname", &world.id);
    hidden(html, "op", "delete");
    hidden(html, "scrollpos", "0");
    html.push_str("<input type=\"submit\" value=\"&#x1F5D1;&#xFE0F; Delete map\"></form>\n");
}

fn write_new_map_button(html: &mut String, world: &WorldEntity) {
    let _ = write!(
        html,
        concat!(
            r#"<form class="mapaction" method="post" action="/" data-world="{}" "#,
            r#"data-replace="{}" onsubmit="return confirmcreate(this);">"#
        ),
        escape(&world.display_name),
        world.has_rendered_map
    );
    hidden(html, "mapname", &world.id);
    hidden(html, "op", "newmap");
    hidden(html, "worldname", &world.display_name);
    hidden(html, "scrollpos", "0");
    hidden(html, "publicmap", if world.is_public { "true" } else { "false" });
    html.push_str("<input type=\"submit\" value=\"&#x1F5FA;&#xFE0F; Make new map\">\n");
    write_detail_select(html, world.render_detail_level);
    html.push_str("\n</form>\n");
}

fn write_detail_select(html: &mut String, selected: DetailLevel) {
    html.push_str(r#" showing: <select name="mapdetail">"#);
    for detail in DetailLevel::ALL {
        let _ = write!(
            html,
            r#"<option value="{}"{}>{}</option>"#,
            detail.flag(),
            if detail == selected { " selected" } else { "" },
            detail.label()
        );
    }
    html.push_str("</select>");
}

fn write_visibility_toggle(html: &mut String, world: &WorldEntity) {
    let (class, state, button) = if world.is_public {
        ("public", "public", "&#x1F512;&#xFE0F; Make private")
    } else {
        ("private", "private", "&#x1F513;&#xFE0F; Make public")
    };
    let _ = write!(
        html,
        concat!(
            r#" &nbsp; <form class="mapaction" method="post" action="/" "#,
            r#"onsubmit="return setscrollpos(this);"><div class="{class}">"#
        ),
        class = class,
    );
    hidden(html, "mapname", &world.id);
    hidden(html, "op", "html_buttonPublicToggle");
    hidden(html, "scrollpos", "0");
    hidden(html, "publicmap", if world.is_public { "false" } else { "true" });
    let _ = writeln!(
        html,
        r#" &nbsp;Map is <strong>{state}</strong> <input type="submit" value="{button}">"#
    );
    html.push_str("</div></form>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{filter, Affordances};
    use std::time::{Duration, UNIX_EPOCH};

    fn entity(
        id: &str,
        name: &str,
        has_rendered_map: bool,
        is_source_world_present: bool,
        is_public: bool,
    ) -> WorldEntity {
        let at = |secs| UNIX_EPOCH + Duration::from_secs(secs);
        WorldEntity {
            id: id.into(),
            display_name: name.into(),
            source_modified_at: is_source_world_present.then(|| at(1_650_000_000)),
            sort_key: 0,
            map_modified_at: has_rendered_map.then(|| at(1_651_000_000)),
            has_rendered_map,
            is_source_world_present,
            render_detail_level: DetailLevel::OverviewPlusBiomes,
            is_public,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(
            escape(r#"<b>"Tom's" & co</b>"#),
            "&lt;b&gt;&quot;Tom&#39;s&quot; &amp; co&lt;/b&gt;"
        );
        assert_eq!(href_segment("a+b=="), "a%2Bb%3D%3D");
        assert_eq!(href_segment("plain_id"), "plain_id");
    }

    #[test]
    fn empty_list() {
        let html = render(&[], Viewer::Public, 0);
        assert!(html.contains("No maps here yet!"));
        assert!(!html.contains("Refresh world list"));
        assert!(html.ends_with("</html>\n"));
    }

    #[test]
    fn management_row_has_controls() {
        let list = [entity("w1", "<Survival>", true, true, false)];
        let html = render(&filter(&list, Viewer::Management), Viewer::Management, 120);
        assert!(html.contains("Refresh world list"));
        assert!(html.contains(r#"<a href="w1/index.html">&lt;Survival&gt;</a>"#));
        assert!(html.contains(r#"name="op" value="newmap""#));
        assert!(html.contains(r#"name="op" value="delete""#));
        assert!(html.contains(r#"name="op" value="html_buttonPublicToggle""#));
        assert!(html.contains(r#"<option value="--html-most" selected>"#));
        assert!(html.contains("Map is <strong>private</strong>"));
        assert!(html.contains(r#"name="publicmap" value="true""#));
        assert!(html.contains("window.scrollTo(0,120);"));
        assert!(html.contains("/thumbnails/w1.jpg"));
        assert!(!html.contains("<Survival>"));
    }

    #[test]
    fn orphan_row_says_world_is_gone() {
        let list = [entity("m1", "Old", true, false, true)];
        let rows = filter(&list, Viewer::Management);
        let expected = Affordances { create: false, delete: true, toggle_visibility: true };
        assert_eq!(rows[0].affordances, expected);
        let html = render(&rows, Viewer::Management, 0);
        assert!(html.contains("World no longer exists"));
        assert!(html.contains(NO_THUMBNAIL));
        assert!(!html.contains(r#"value="newmap""#));
    }

    #[test]
    fn public_rows_are_read_only() {
        let list = [
            entity("w1", "Shared", true, true, true),
            entity("w2", "Hidden", true, true, false),
        ];
        let html = render(&filter(&list, Viewer::Public), Viewer::Public, 0);
        assert!(html.contains("Shared"));
        assert!(!html.contains("Hidden"));
        assert!(!html.contains("<form"));
    }
}
