use std::cmp::Ordering;
use std::path::Path;

use async_stream::stream;
use bytes::BytesMut;
use futures_util::StreamExt;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use tokio::io::AsyncReadExt;

use crate::body::Body;
use crate::davpath::{encode_path, DavPath};
use crate::errors::DavError;
use crate::fs;
use crate::mount::Mountpoint;
use crate::util::{html_escape, version_cmp};
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_get(
        &self,
        _req: &Request<()>,
        mount: &Mountpoint,
        path: &DavPath,
        send_body: bool,
    ) -> DavResult<Response<Body>> {
        let abspath = mount.resolve_strict(path).await?;

        let meta = tokio::fs::metadata(&abspath).await?;
        if meta.is_dir() {
            return self.directory_listing(path, &abspath, send_body).await;
        }

        let mut file = tokio::fs::File::open(&abspath)
            .await
            .map_err(|_| DavError::Forbidden)?;
        let meta = file.metadata().await.map_err(|_| DavError::Forbidden)?;

        let mut res = Response::new(Body::empty());
        res.headers_mut()
            .typed_insert(headers::ContentLength(meta.len()));
        if let Ok(modified) = meta.modified() {
            res.headers_mut()
                .typed_insert(headers::LastModified::from(modified));
        }
        if let Some(mime) = mime_guess::from_path(&abspath).first() {
            res.headers_mut().typed_insert(headers::ContentType::from(mime));
        }

        if send_body {
            let buf_size = self.opts.read_buf_size;
            let mut remains = meta.len();
            *res.body_mut() = Body::stream(stream! {
                while remains > 0 {
                    let chunk = buf_size.min(remains as usize);
                    let mut buf = BytesMut::with_capacity(chunk);
                    match file.read_buf(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            remains = remains.saturating_sub(n as u64);
                            yield Ok(buf.freeze());
                        }
                        Err(e) => {
                            yield Err(e);
                            break;
                        }
                    }
                }
            });
        }
        Ok(res)
    }

    // GET on a collection renders an HTML index.
    async fn directory_listing(
        &self,
        path: &DavPath,
        abspath: &Path,
        send_body: bool,
    ) -> DavResult<Response<Body>> {
        let mut res = Response::new(Body::empty());
        res.headers_mut()
            .typed_insert(headers::ContentType::html());
        if !send_body {
            return Ok(res);
        }

        let mut html = String::new();
        html.push_str("<html><head><title>");
        html.push_str(&html_escape(&path.to_string()));
        html.push_str("</title>");
        for css in &self.opts.css {
            html.push_str(&format!(
                "<link rel=\"stylesheet\" href=\"{css}\" type=\"text/css\">"
            ));
        }
        for js in &self.opts.javascript {
            html.push_str(&format!("<script src=\"{js}\"></script>"));
        }
        html.push_str("</head><body>");
        match &self.opts.div {
            Some(id) => html.push_str(&format!("<div id=\"{id}\">")),
            None => html.push_str("<div>"),
        }
        html.push_str("<ul>");

        let dirclass = self
            .opts
            .class_directory
            .as_deref()
            .unwrap_or("directory");
        add_item(&mut html, dirclass, "..", true);

        let mut entries: Vec<(String, bool)> = Vec::new();
        let mut stream = fs::read_dir_stream(abspath).await?;
        while let Some(entry) = stream.next().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            // entries starting with a dot are hidden.
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push((name, is_dir));
        }
        entries.sort_by(|a, b| match version_cmp(&a.0, &b.0) {
            Ordering::Equal => a.1.cmp(&b.1),
            ord => ord,
        });
        for (name, is_dir) in &entries {
            add_item(&mut html, dirclass, name, *is_dir);
        }

        html.push_str("</ul></div></body></html>");

        res.headers_mut()
            .typed_insert(headers::ContentLength(html.len() as u64));
        *res.body_mut() = Body::from(html);
        *res.status_mut() = StatusCode::OK;
        Ok(res)
    }
}

fn add_item(html: &mut String, dirclass: &str, name: &str, is_dir: bool) {
    let href = encode_path(name);
    let text = html_escape(name);
    if is_dir {
        html.push_str(&format!(
            "<li class=\"{dirclass}\"><a href=\"{href}/\">{text}/</a></li>"
        ));
    } else {
        html.push_str(&format!("<li><a href=\"{href}\">{text}</a></li>"));
    }
}
