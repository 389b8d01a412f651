//! The playground page.
//!
//! A bare page that exercises the wire protocol by hand: fetch a request
//! token, invoke actions, and open the `notes` and `clock` streams.

use axum::response::Html as PageHtml;

const INDEX: &str = r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Heimdall</title>
</head>
<body>
<h1 id="title"></h1>
<p id="header"></p>
<p>Server time: <span id="clock">--:--:--</span></p>
<div id="counter"></div>
<button data-op="dec">-</button> <button data-op="inc">+</button> <button data-op="reset">reset</button>
<form id="note-form">
  <input name="title" placeholder="Title"> <input name="content" placeholder="Content">
  <button>Add note</button>
</form>
<div id="note-result"></div>
<ul id="notes-list"></ul>
<script>
const base = "{BASE}";
let csrf = null;
async function token() {
  if (!csrf) {
    const r = await fetch(base + "/v1/csrf", { credentials: "same-origin" });
    csrf = (await r.json()).requestToken;
  }
  return csrf;
}
async function invoke(action, payload) {
  const r = await fetch(base + "/v1/content/actions", {
    method: "POST",
    credentials: "same-origin",
    headers: {
      "Content-Type": "application/json",
      "X-Heimdall-Content-Action": action,
      "RequestVerificationToken": await token(),
    },
    body: payload === undefined ? "" : JSON.stringify(payload),
  });
  return r.status === 200 ? r.text() : "";
}
function applyOob(html) {
  const t = document.createElement("template");
  t.innerHTML = html;
  for (const oob of t.content.querySelectorAll("template[heimdall-oob]")) {
    const target = document.querySelector(oob.getAttribute("heimdall-content-target"));
    if (!target) continue;
    const swap = oob.getAttribute("heimdall-content-swap") || "inner";
    if (swap === "inner") target.innerHTML = oob.innerHTML;
    else target.insertAdjacentHTML(swap, oob.innerHTML);
  }
}
async function stream(topic) {
  const r = await fetch(base + "/v1/bifrost/token?topic=" + encodeURIComponent(topic), {
    credentials: "same-origin",
    headers: { "RequestVerificationToken": await token() },
  });
  const { token: st } = await r.json();
  const es = new EventSource(base + "/v1/bifrost?topic=" + encodeURIComponent(topic) + "&st=" + encodeURIComponent(st));
  es.addEventListener("heimdall", (e) => applyOob(e.data));
}
(async () => {
  document.getElementById("title").innerHTML = await invoke("Home.Title");
  document.getElementById("header").innerHTML = await invoke("Home.Header");
  document.getElementById("counter").innerHTML = await invoke("Home.CounterShow");
  document.getElementById("notes-list").innerHTML = await invoke("Notes.Page", { offset: 0, size: 20 });
  for (const b of document.querySelectorAll("button[data-op]")) {
    b.onclick = async () => {
      document.getElementById("counter").innerHTML = await invoke("Home.CounterOp", { op: b.dataset.op, step: 1 });
    };
  }
  document.getElementById("note-form").onsubmit = async (e) => {
    e.preventDefault();
    const f = new FormData(e.target);
    document.getElementById("note-result").innerHTML =
      await invoke("Notes.Create", { title: f.get("title"), content: f.get("content") });
  };
  stream("notes");
  stream("clock");
})();
</script>
</body>
</html>
"##;

/// Render the page for a given Heimdall base path.
pub fn index(base_path: &str) -> PageHtml<String> {
    PageHtml(INDEX.replace("{BASE}", base_path))
}
