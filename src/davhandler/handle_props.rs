use std::path::{Path, PathBuf};

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::StreamExt;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use xmltree::Element;

use crate::body::Body;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::fs;
use crate::mount::Mountpoint;
use crate::multistatus::{
    parse_propertyupdate, parse_propfind, MultiStatus, PatchAction, PropStat, PropfindType,
    NS_DAV_URI,
};
use crate::props;
use crate::util::protocol_string;
use crate::xmltree_ext::ElementExt;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_propfind(
        &self,
        req: &Request<()>,
        mount: &Mountpoint,
        path: &DavPath,
        body: &[u8],
    ) -> DavResult<Response<Body>> {
        let abspath = mount.resolve_strict(path).await?;
        let meta = tokio::fs::metadata(&abspath)
            .await
            .map_err(|_| DavError::NotFound)?;

        let pftype = parse_propfind(body)?;

        // RFC default: infinity. An absent header on a non-collection
        // can only mean the resource itself.
        let depth = match req.headers().typed_get::<davheaders::Depth>() {
            Some(depth) => depth,
            None if meta.is_dir() => davheaders::Depth::Infinity,
            None => davheaders::Depth::Zero,
        };

        let mut path = path.clone();
        if meta.is_dir() {
            path.add_slash();
        }

        let mut ms = MultiStatus::new(protocol_string(req.version()));
        // the collection itself is the first entry, under the
        // request's own URI.
        self.propfind_entry(&mut ms, &path, &abspath, &meta, &pftype);
        if meta.is_dir() && depth != davheaders::Depth::Zero {
            self.propfind_directory(&mut ms, path, abspath, depth, &pftype)
                .await;
        }
        ms.into_response()
    }

    // one multistatus response element for a single resource.
    fn propfind_entry(
        &self,
        ms: &mut MultiStatus,
        path: &DavPath,
        abspath: &Path,
        meta: &std::fs::Metadata,
        pftype: &PropfindType,
    ) {
        let display = path.to_string();
        let propstats = match pftype {
            PropfindType::AllProp | PropfindType::PropName => {
                let with_values = matches!(pftype, PropfindType::AllProp);
                let mut found = props::live_properties(&display, abspath, meta, with_values);
                for dead in props::dead_properties(abspath) {
                    found.push(props::dead_prop_element(&dead, with_values));
                }
                vec![PropStat {
                    status: StatusCode::OK,
                    props: found,
                }]
            }
            PropfindType::Prop(requested) => {
                let live = props::live_properties(&display, abspath, meta, true);
                let dead = props::dead_properties(abspath);
                let mut found = Vec::new();
                let mut missing = Vec::new();
                for want in requested {
                    if let Some(prop) = live.iter().find(|l| props::matches_live(want, l)) {
                        found.push(prop.clone());
                    } else if let Some(prop) = dead.iter().find(|d| props::matches_dead(want, d)) {
                        found.push(props::dead_prop_element(prop, true));
                    } else {
                        missing.push(requested_prop_element(want));
                    }
                }
                vec![
                    PropStat {
                        status: StatusCode::OK,
                        props: found,
                    },
                    PropStat {
                        status: StatusCode::NOT_FOUND,
                        props: missing,
                    },
                ]
            }
        };
        ms.add_response(&path.as_url_string(), propstats);
    }

    // depth 1 and infinity traversal. Entries whose stat fails are
    // skipped so the rest of the collection still renders.
    fn propfind_directory<'a>(
        &'a self,
        ms: &'a mut MultiStatus,
        path: DavPath,
        abspath: PathBuf,
        depth: davheaders::Depth,
        pftype: &'a PropfindType,
    ) -> BoxFuture<'a, ()> {
        async move {
            let mut entries = match fs::read_dir_stream(&abspath).await {
                Ok(entries) => entries,
                Err(e) => {
                    error!("read_dir {abspath:?} failed: {e}");
                    return;
                }
            };
            while let Some(entry) = entries.next().await {
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                let entry_path = entry.path();
                let meta = match tokio::fs::metadata(&entry_path).await {
                    Ok(meta) => meta,
                    Err(e) => {
                        debug!("stat {entry_path:?} failed, skipping: {e}");
                        continue;
                    }
                };
                let child = path.with_segment(&name, meta.is_dir());
                self.propfind_entry(ms, &child, &entry_path, &meta, pftype);
                if depth == davheaders::Depth::Infinity && meta.is_dir() {
                    self.propfind_directory(ms, child, entry_path, depth, pftype)
                        .await;
                }
            }
        }
        .boxed()
    }

    pub(crate) async fn handle_proppatch(
        &self,
        req: &Request<()>,
        mount: &Mountpoint,
        path: &DavPath,
        body: &[u8],
    ) -> DavResult<Response<Body>> {
        let abspath = mount.resolve_strict(path).await?;
        if body.is_empty() {
            return Err(DavError::XmlParse);
        }
        let updates = parse_propertyupdate(body)?;

        // apply in document order; every update gets its own status in
        // the response body.
        let mut done = Vec::new();
        let mut failed = Vec::new();
        for (action, prop) in &updates {
            let ns = prop.namespace.as_deref();
            let result = if ns == Some(NS_DAV_URI) {
                // live properties cannot be overwritten or removed.
                Err(DavError::Forbidden)
            } else {
                match action {
                    PatchAction::Set => {
                        let value = prop.text.clone().unwrap_or_default();
                        props::set_prop(&abspath, ns, &prop.name, value.as_bytes())
                    }
                    PatchAction::Remove => props::del_prop(&abspath, ns, &prop.name),
                }
            };
            let rendered = requested_prop_element(prop);
            match result {
                Ok(()) => done.push(rendered),
                Err(_) => failed.push(rendered),
            }
        }

        let mut ms = MultiStatus::new(protocol_string(req.version()));
        ms.add_response(
            &path.as_url_string(),
            vec![
                PropStat {
                    status: StatusCode::OK,
                    props: done,
                },
                PropStat {
                    status: StatusCode::FORBIDDEN,
                    props: failed,
                },
            ],
        );
        ms.into_response()
    }
}

// Render a property from a request body as an empty response element,
// preserving its namespace.
fn requested_prop_element(prop: &Element) -> Element {
    match prop.namespace.as_deref() {
        Some(NS_DAV_URI) => Element::new2(&format!("D:{}", prop.name)),
        Some(ns) => Element::new(&prop.name).ns("", ns),
        None => Element::new(&prop.name),
    }
}
