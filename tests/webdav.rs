//
// End-to-end tests: drive DavHandler with http requests against a
// scratch docroot.
//
use std::path::Path;

use futures_util::StreamExt;
use http::{HeaderMap, StatusCode};

use davmount::{Body, DavHandler};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn handler(dir: &Path) -> DavHandler {
    DavHandler::builder().mount("", dir).build().unwrap()
}

async fn request(
    handler: &DavHandler,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> (StatusCode, HeaderMap, Vec<u8>) {
    let mut builder = http::Request::builder()
        .method(method)
        .uri(uri)
        .header("Host", "h");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    let resp = handler.handle(req).await;
    let (parts, mut body) = resp.into_parts();
    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk.unwrap());
    }
    (parts.status, parts.headers, buf)
}

// xattrs are not supported on every filesystem (or platform).
fn probe_xattr(dir: &Path) -> bool {
    #[cfg(unix)]
    {
        let probe = dir.join(".xattr-probe");
        std::fs::write(&probe, b"").unwrap();
        let supported = xattr::set(&probe, "user.probe", b"x").is_ok();
        std::fs::remove_file(&probe).unwrap();
        supported
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
        false
    }
}

#[tokio::test]
async fn put_then_get() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());

    let (status, _, _) = request(&dav, "PUT", "/a.txt", &[], "hello").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, headers, body) = request(&dav, "GET", "/a.txt", &[], "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"hello");
    assert_eq!(headers["content-length"], "5");
    assert_eq!(headers["content-type"], "text/plain");
    assert!(headers.contains_key("last-modified"));

    // HEAD: same headers, no body.
    let (status, headers, body) = request(&dav, "HEAD", "/a.txt", &[], "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-length"], "5");
    assert!(body.is_empty());

    // PUT over an existing file replaces the content.
    let (status, _, _) = request(&dav, "PUT", "/a.txt", &[], "hi").await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, _, body) = request(&dav, "GET", "/a.txt", &[], "").await;
    assert_eq!(body, b"hi");
}

#[tokio::test]
async fn put_missing_parent_conflicts() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());

    let (status, _, _) = request(&dav, "PUT", "/no/dir/a.txt", &[], "x").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn get_missing_and_escapes_are_not_found() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());

    let (status, _, _) = request(&dav, "GET", "/nope.txt", &[], "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // dot-dot, encoded or not, cannot leave the docroot.
    let (status, _, _) = request(&dav, "GET", "/%2e%2e/%2e%2e/etc/passwd", &[], "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = request(&dav, "GET", "/../secret", &[], "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mkcol_semantics() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());

    let (status, _, _) = request(&dav, "MKCOL", "/d/", &[], "").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(tmp.path().join("d").is_dir());

    // existing target: 405. missing parent: 409. body: 415.
    let (status, _, _) = request(&dav, "MKCOL", "/d/", &[], "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _, _) = request(&dav, "MKCOL", "/x/y/", &[], "").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _, _) = request(&dav, "MKCOL", "/e/", &[], "<x/>").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn delete_file_and_tree() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());

    std::fs::create_dir(tmp.path().join("d")).unwrap();
    std::fs::write(tmp.path().join("d/a"), b"1").unwrap();
    std::fs::write(tmp.path().join("d/b"), b"2").unwrap();
    std::fs::write(tmp.path().join("f"), b"3").unwrap();

    let (status, _, _) = request(&dav, "DELETE", "/f", &[], "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!tmp.path().join("f").exists());

    let (status, _, _) = request(&dav, "DELETE", "/d/", &[], "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!tmp.path().join("d").exists());

    let (status, _, _) = request(&dav, "DELETE", "/gone", &[], "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn move_overwrite_semantics() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());

    std::fs::write(tmp.path().join("a.txt"), b"source").unwrap();
    std::fs::write(tmp.path().join("b.txt"), b"dest").unwrap();

    // Overwrite: F onto an existing destination: 412, nothing moved.
    let (status, _, _) = request(
        &dav,
        "MOVE",
        "/a.txt",
        &[("Destination", "http://h/b.txt"), ("Overwrite", "F")],
        "",
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(std::fs::read(tmp.path().join("a.txt")).unwrap(), b"source");
    assert_eq!(std::fs::read(tmp.path().join("b.txt")).unwrap(), b"dest");

    // Overwrite: T replaces it: 204.
    let (status, _, _) = request(
        &dav,
        "MOVE",
        "/a.txt",
        &[("Destination", "http://h/b.txt"), ("Overwrite", "T")],
        "",
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!tmp.path().join("a.txt").exists());
    assert_eq!(std::fs::read(tmp.path().join("b.txt")).unwrap(), b"source");

    // moving to a fresh name: 201.
    let (status, _, _) = request(
        &dav,
        "MOVE",
        "/b.txt",
        &[("Destination", "http://h/c.txt")],
        "",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // destination with a missing parent: 409.
    let (status, _, _) = request(
        &dav,
        "MOVE",
        "/c.txt",
        &[("Destination", "http://h/no/dir/c.txt")],
        "",
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn copy_file_and_collection() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());

    std::fs::write(tmp.path().join("a.txt"), b"data").unwrap();
    let (status, _, _) = request(
        &dav,
        "COPY",
        "/a.txt",
        &[("Destination", "http://h/b.txt")],
        "",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(std::fs::read(tmp.path().join("a.txt")).unwrap(), b"data");
    assert_eq!(std::fs::read(tmp.path().join("b.txt")).unwrap(), b"data");

    std::fs::create_dir_all(tmp.path().join("d/sub")).unwrap();
    std::fs::write(tmp.path().join("d/f"), b"1").unwrap();
    std::fs::write(tmp.path().join("d/sub/g"), b"2").unwrap();
    let (status, _, _) = request(
        &dav,
        "COPY",
        "/d/",
        &[("Destination", "http://h/d2/")],
        "",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(std::fs::read(tmp.path().join("d2/f")).unwrap(), b"1");
    assert_eq!(std::fs::read(tmp.path().join("d2/sub/g")).unwrap(), b"2");
    // the source is untouched.
    assert!(tmp.path().join("d/f").exists());
}

#[tokio::test]
async fn propfind_depths() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());

    std::fs::create_dir(tmp.path().join("d")).unwrap();
    std::fs::write(tmp.path().join("d/a"), b"1").unwrap();
    std::fs::write(tmp.path().join("d/b"), b"2").unwrap();
    std::fs::create_dir(tmp.path().join("d/sub")).unwrap();
    std::fs::write(tmp.path().join("d/sub/deep"), b"3").unwrap();

    // depth 0: exactly the collection itself.
    let (status, headers, body) =
        request(&dav, "PROPFIND", "/d/", &[("Depth", "0")], "").await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(headers["content-type"], "application/xml; charset=\"utf-8\"");
    let body = String::from_utf8(body).unwrap();
    assert_eq!(body.matches("<D:response>").count(), 1);
    assert!(body.contains("<D:collection"));
    assert!(body.contains("<D:href>/d/</D:href>"));

    // depth 1: the self entry plus one entry per child, not deeper.
    let (_, _, body) = request(&dav, "PROPFIND", "/d/", &[("Depth", "1")], "").await;
    let body = String::from_utf8(body).unwrap();
    assert_eq!(body.matches("<D:response>").count(), 4);
    assert!(body.contains("<D:href>/d/sub/</D:href>"));
    assert!(!body.contains("deep"));

    // depth infinity recurses.
    let (_, _, body) =
        request(&dav, "PROPFIND", "/d/", &[("Depth", "infinity")], "").await;
    let body = String::from_utf8(body).unwrap();
    assert_eq!(body.matches("<D:response>").count(), 5);
    assert!(body.contains("/d/sub/deep"));

    // a file always answers with a single entry.
    let (_, _, body) = request(&dav, "PROPFIND", "/d/a", &[], "").await;
    let body = String::from_utf8(body).unwrap();
    assert_eq!(body.matches("<D:response>").count(), 1);
    assert!(body.contains("<D:getcontentlength>1</D:getcontentlength>"));

    // a missing target is a plain 404.
    let (status, _, _) = request(&dav, "PROPFIND", "/nope", &[], "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn propfind_propname_and_prop() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());
    std::fs::write(tmp.path().join("f.txt"), b"hello").unwrap();

    let body = r#"<?xml version="1.0"?>
        <D:propfind xmlns:D="DAV:"><D:propname/></D:propfind>"#;
    let (status, _, resp) =
        request(&dav, "PROPFIND", "/f.txt", &[("Depth", "0")], body).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    let resp = String::from_utf8(resp).unwrap();
    // names only, no values.
    assert!(resp.contains("<D:getcontentlength"));
    assert!(!resp.contains(">5<"));

    let body = r#"<D:propfind xmlns:D="DAV:"><D:prop>
        <D:getcontentlength/><D:nosuchprop/>
        </D:prop></D:propfind>"#;
    let (_, _, resp) = request(&dav, "PROPFIND", "/f.txt", &[("Depth", "0")], body).await;
    let resp = String::from_utf8(resp).unwrap();
    assert!(resp.contains("<D:getcontentlength>5</D:getcontentlength>"));
    assert!(resp.contains("404"));
    assert!(resp.contains("nosuchprop"));
}

#[tokio::test]
async fn proppatch_and_propfind_round_trip() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    if !probe_xattr(tmp.path()) {
        eprintln!("skipping: no xattr support on this filesystem");
        return;
    }
    let dav = handler(tmp.path());
    std::fs::write(tmp.path().join("a.txt"), b"x").unwrap();

    let body = r#"<?xml version="1.0"?>
        <D:propertyupdate xmlns:D="DAV:">
          <D:set><D:prop><foo xmlns="X">bar</foo></D:prop></D:set>
        </D:propertyupdate>"#;
    let (status, _, resp) = request(&dav, "PROPPATCH", "/a.txt", &[], body).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    let resp = String::from_utf8(resp).unwrap();
    assert!(resp.contains("HTTP/1.1 200 OK"));
    assert!(resp.contains("<D:href>/a.txt</D:href>"));

    // the property comes back, namespace and value intact.
    let (_, _, resp) = request(&dav, "PROPFIND", "/a.txt", &[("Depth", "0")], "").await;
    let resp = String::from_utf8(resp).unwrap();
    assert!(resp.contains("<foo xmlns=\"X\">bar</foo>"));

    // remove it again.
    let body = r#"<D:propertyupdate xmlns:D="DAV:">
          <D:remove><D:prop><foo xmlns="X"/></D:prop></D:remove>
        </D:propertyupdate>"#;
    let (status, _, _) = request(&dav, "PROPPATCH", "/a.txt", &[], body).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    let (_, _, resp) = request(&dav, "PROPFIND", "/a.txt", &[("Depth", "0")], "").await;
    assert!(!String::from_utf8(resp).unwrap().contains("bar"));

    // writing a DAV: live property is refused per-prop.
    let body = r#"<D:propertyupdate xmlns:D="DAV:">
          <D:set><D:prop><D:getlastmodified>x</D:getlastmodified></D:prop></D:set>
        </D:propertyupdate>"#;
    let (status, _, resp) = request(&dav, "PROPPATCH", "/a.txt", &[], body).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(String::from_utf8(resp).unwrap().contains("403"));
}

#[tokio::test]
async fn lock_unlock_cycle() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());
    std::fs::write(tmp.path().join("a.txt"), b"x").unwrap();

    let lockinfo = r#"<?xml version="1.0"?>
        <D:lockinfo xmlns:D="DAV:">
          <D:lockscope><D:exclusive/></D:lockscope>
          <D:locktype><D:write/></D:locktype>
          <D:owner><D:href>me</D:href></D:owner>
        </D:lockinfo>"#;

    let (status, headers, body) = request(
        &dav,
        "LOCK",
        "/a.txt",
        &[("Timeout", "Second-600")],
        lockinfo,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = headers["lock-token"]
        .to_str()
        .unwrap()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string();
    assert!(token.starts_with("opaquelocktoken:"));
    let body = String::from_utf8(body).unwrap();
    assert!(body.contains("<D:lockdiscovery>"));
    assert!(body.contains("<D:timeout>Second-600</D:timeout>"));
    assert!(body.contains("<D:owner>me</D:owner>"));

    // a second LOCK conflicts.
    let (status, _, _) = request(&dav, "LOCK", "/a.txt", &[], lockinfo).await;
    assert_eq!(status, StatusCode::LOCKED);

    // mutating methods without the token are refused...
    let (status, _, _) = request(&dav, "PUT", "/a.txt", &[], "new").await;
    assert_eq!(status, StatusCode::LOCKED);
    // ...and pass with it.
    let if_header = format!("(<{token}>)");
    let (status, _, _) = request(&dav, "PUT", "/a.txt", &[("If", &if_header)], "new").await;
    assert_eq!(status, StatusCode::CREATED);

    // refresh: bodyless LOCK with the token.
    let (status, _, body) = request(
        &dav,
        "LOCK",
        "/a.txt",
        &[("If", &if_header), ("Timeout", "Second-120")],
        "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body)
        .unwrap()
        .contains("<D:timeout>Second-120</D:timeout>"));

    // unlock: unknown token is a conflict, the right one releases.
    let (status, _, _) = request(
        &dav,
        "UNLOCK",
        "/a.txt",
        &[("Lock-Token", "<opaquelocktoken:bogus>")],
        "",
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let bracketed = format!("<{token}>");
    let (status, _, _) = request(&dav, "UNLOCK", "/a.txt", &[("Lock-Token", &bracketed)], "").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // released: can be taken again.
    let (status, _, _) = request(&dav, "LOCK", "/a.txt", &[], lockinfo).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn lock_unmapped_url_creates_resource() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());

    let lockinfo = r#"<D:lockinfo xmlns:D="DAV:">
        <D:lockscope><D:exclusive/></D:lockscope>
        <D:locktype><D:write/></D:locktype>
        </D:lockinfo>"#;
    let (status, _, _) = request(&dav, "LOCK", "/fresh.txt", &[], lockinfo).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(tmp.path().join("fresh.txt").exists());
}

#[tokio::test]
async fn directory_listing() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = DavHandler::builder()
        .mount("", tmp.path())
        .css("/s.css")
        .javascript("/s.js")
        .div("listing")
        .class_directory("dir")
        .build()
        .unwrap();

    std::fs::write(tmp.path().join("file10"), b"x").unwrap();
    std::fs::write(tmp.path().join("file2"), b"x").unwrap();
    std::fs::create_dir(tmp.path().join("sub")).unwrap();
    std::fs::write(tmp.path().join(".hidden"), b"x").unwrap();

    let (status, headers, body) = request(&dav, "GET", "/", &[], "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers["content-type"].to_str().unwrap().starts_with("text/html"));
    let html = String::from_utf8(body).unwrap();

    assert!(html.contains("<link rel=\"stylesheet\" href=\"/s.css\""));
    assert!(html.contains("<script src=\"/s.js\">"));
    assert!(html.contains("<div id=\"listing\">"));
    assert!(html.contains("<li class=\"dir\"><a href=\"sub/\">sub/</a></li>"));
    assert!(html.contains("<a href=\"../\">../</a>"));
    assert!(html.contains("<a href=\"file2\">"));
    assert!(!html.contains(".hidden"));
    // version order: file2 before file10.
    let pos2 = html.find("file2").unwrap();
    let pos10 = html.find("file10").unwrap();
    assert!(pos2 < pos10);
}

#[tokio::test]
async fn options_and_unknown_methods() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());

    let (status, headers, _) = request(&dav, "OPTIONS", "/", &[], "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["dav"], "1, 2");
    assert!(headers["allow"].to_str().unwrap().contains("PROPFIND"));

    let (status, _, _) = request(&dav, "TRACE", "/", &[], "").await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn mountpoint_prefix_routing() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("f"), b"data").unwrap();
    let dav = DavHandler::builder().mount("/dav", tmp.path()).build().unwrap();

    let (status, _, body) = request(&dav, "GET", "/dav/f", &[], "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"data");

    // outside the prefix nothing is served.
    let (status, _, _) = request(&dav, "GET", "/other/f", &[], "").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // hrefs carry the prefix.
    let (_, _, body) = request(&dav, "PROPFIND", "/dav/f", &[("Depth", "0")], "").await;
    assert!(String::from_utf8(body).unwrap().contains("<D:href>/dav/f</D:href>"));
}

#[tokio::test]
async fn locks_are_scoped_per_host() {
    init();
    let tmp = tempfile::tempdir().unwrap();
    let dav = handler(tmp.path());
    std::fs::write(tmp.path().join("a"), b"x").unwrap();

    let lockinfo = r#"<D:lockinfo xmlns:D="DAV:">
        <D:lockscope><D:exclusive/></D:lockscope>
        <D:locktype><D:write/></D:locktype>
        </D:lockinfo>"#;

    // the helper always sends Host: h; lock under another host by
    // sending an absolute-form URI.
    let (status, _, _) = request(&dav, "LOCK", "http://h/a", &[], lockinfo).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = request(&dav, "LOCK", "http://other/a", &[], lockinfo).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = request(&dav, "LOCK", "http://h/a", &[], lockinfo).await;
    assert_eq!(status, StatusCode::LOCKED);
}
