//! 渲染用 HTML 模板

use crate::models::question::{Message, Question};
use crate::render::chunker::Chunk;

const IMAGE_STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; background: #fff; }
.header {
    border-bottom: 1px solid gray;
    padding: 16px 40px;
    display: flex;
    justify-content: space-between;
    align-items: center;
    font-size: 18px;
}
.content { padding: 16px 40px; }
.message { margin-bottom: 16px; }
.role { color: red; font-weight: 600; text-transform: capitalize; }
"#;

const PDF_STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; background: #fff; }
body {
    width: 100%;
    overflow-wrap: break-word;
    word-wrap: break-word;
    word-break: break-word;
    font-family: sans-serif;
}
.header {
    border-bottom: 1px solid gray;
    padding: 16px 40px;
    display: flex;
    justify-content: space-between;
    align-items: center;
    font-size: 18px;
    margin-bottom: 40px;
}
.message { margin-bottom: 16px; font-size: 20px; line-height: 28px; }
.role { color: red; font-weight: 600; text-transform: capitalize; }
"#;

/// 一个切块渲染成一页图片
pub fn chunk_html(chunk: &Chunk) -> String {
    format!(
        r#"<html>
  <head><meta charset="utf-8"><style>{}</style></head>
  <body>
    {}
    <div class="content">{}</div>
  </body>
</html>"#,
        IMAGE_STYLE,
        session_header(chunk.session_index, &chunk.session_date),
        messages_html(&chunk.messages)
    )
}

/// 一道题目的全部会话渲染成一个 PDF
pub fn conversation_html(question: &Question) -> String {
    let body: String = question
        .sessions()
        .map(|s| format!("{}{}", session_header(s.index, s.date), messages_html(s.messages)))
        .collect();

    format!(
        r#"<html>
  <head><meta charset="utf-8"><style>{}</style></head>
  <body>{}</body>
</html>"#,
        PDF_STYLE, body
    )
}

fn session_header(index: usize, date: &str) -> String {
    format!(
        r#"<div class="header"><p>Session {}</p><p>Session Date: {}</p></div>"#,
        index,
        escape_html(date)
    )
}

fn messages_html(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                r#"<p class="message"><span class="role">{}:</span> {}</p>"#,
                m.role.as_str(),
                escape_html(&m.content)
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
