//! eCFR snapshot ingestion from the versioner API.
//!
//! Downloads each CFR title as full XML
//! (`/api/versioner/v1/full/<date>/title-N.xml`), saves the raw XML under
//! the snapshot's `xml/` directory, and flattens every
//! `<DIV8 TYPE="SECTION">` into a section-level document appended to
//! `manifest.jsonl`. Title 35 is reserved and the `/full/` API rejects it,
//! so it is skipped up front. A download failure for one title skips that
//! title and continues; unlike HTS, titles are independent documents and a
//! partial eCFR snapshot is still useful.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Write;
use std::time::Duration;

use crate::config::Config;
use crate::models::EcfrSection;
use crate::snapshot::{snapshot_dir, Corpus};

/// Title metadata from `titles.json`.
#[derive(Debug, Clone)]
pub struct TitleMeta {
    pub number: String,
    pub name: Option<String>,
}

/// Title 35 is reserved; the `/full/` endpoint returns an error for it.
pub fn is_reserved_title(number: &str) -> bool {
    number == "35"
}

fn titles_from_json(json: &serde_json::Value) -> Result<Vec<TitleMeta>> {
    let titles = json
        .get("titles")
        .and_then(|t| t.as_array())
        .ok_or_else(|| anyhow::anyhow!("titles.json missing 'titles' array"))?;

    let mut out = Vec::with_capacity(titles.len());
    for t in titles {
        // The API has carried the number under both "title" and "number".
        let number = t
            .get("title")
            .or_else(|| t.get("number"))
            .map(value_to_string);
        let Some(number) = number else { continue };

        out.push(TitleMeta {
            number,
            name: t.get("name").and_then(|n| n.as_str()).map(str::to_string),
        });
    }
    Ok(out)
}

fn value_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============ Section extraction ============

/// A `DIV*` ancestor on the parse stack.
struct DivFrame {
    div_type: Option<String>,
    n: Option<String>,
}

/// In-flight state for the `DIV8 TYPE="SECTION"` currently being captured.
struct SectionCapture {
    n: Option<String>,
    citation: Option<String>,
    path: Option<String>,
    part: Option<String>,
    subpart: Option<String>,
    head_parts: Vec<String>,
    head_done: bool,
    paragraphs: Vec<String>,
    current_p: Vec<String>,
    /// Element depth relative to the DIV8; `HEAD` counts only as a direct
    /// child (depth 1), matching the source schema.
    rel_depth: i32,
    in_head: bool,
    in_p: u32,
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == name.as_bytes() {
            a.unescape_value().ok().map(|v| v.to_string())
        } else {
            None
        }
    })
}

fn nearest_ancestor_n(stack: &[DivFrame], div_type: &str) -> Option<String> {
    stack
        .iter()
        .rev()
        .find(|f| f.div_type.as_deref() == Some(div_type))
        .and_then(|f| f.n.clone())
}

/// Parses one title's XML into section-level documents.
///
/// Sections whose paragraph text is empty (structural or reserved
/// sections) are dropped, matching the manifest the indexer expects.
pub fn parse_title_sections(
    xml: &str,
    snapshot_date: &str,
    title: &TitleMeta,
) -> Result<Vec<EcfrSection>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<DivFrame> = Vec::new();
    let mut section: Option<SectionCapture> = None;
    let mut sections: Vec<EcfrSection> = Vec::new();

    loop {
        match reader.read_event() {
            Err(e) => return Err(e).context("Failed to parse title XML"),
            Ok(Event::Eof) => break,

            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                if let Some(cap) = section.as_mut() {
                    cap.rel_depth += 1;
                    if name == "HEAD" && cap.rel_depth == 1 && !cap.head_done {
                        cap.in_head = true;
                    } else if name == "P" {
                        if cap.in_p == 0 {
                            cap.current_p.clear();
                        }
                        cap.in_p += 1;
                    }
                } else if name == "DIV8" && attr_value(&e, "TYPE").as_deref() == Some("SECTION") {
                    let (citation, path) = match attr_value(&e, "hierarchy_metadata") {
                        Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                            Ok(hm) => (
                                hm.get("citation").and_then(|v| v.as_str()).map(str::to_string),
                                hm.get("path").and_then(|v| v.as_str()).map(str::to_string),
                            ),
                            Err(_) => (None, None),
                        },
                        None => (None, None),
                    };

                    section = Some(SectionCapture {
                        n: attr_value(&e, "N"),
                        citation,
                        path,
                        part: nearest_ancestor_n(&stack, "PART"),
                        subpart: nearest_ancestor_n(&stack, "SUBPART"),
                        head_parts: Vec::new(),
                        head_done: false,
                        paragraphs: Vec::new(),
                        current_p: Vec::new(),
                        rel_depth: 0,
                        in_head: false,
                        in_p: 0,
                    });
                }

                if section.is_none() && name.starts_with("DIV") {
                    stack.push(DivFrame {
                        div_type: attr_value(&e, "TYPE"),
                        n: attr_value(&e, "N"),
                    });
                }
            }

            Ok(Event::Text(t)) => {
                if let Some(cap) = section.as_mut() {
                    let text = t.unescape().unwrap_or_default().to_string();
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if cap.in_head {
                        cap.head_parts.push(trimmed.to_string());
                    } else if cap.in_p > 0 {
                        cap.current_p.push(trimmed.to_string());
                    }
                }
            }

            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

                if let Some(cap) = section.as_mut() {
                    if name == "HEAD" && cap.in_head {
                        cap.in_head = false;
                        cap.head_done = true;
                    } else if name == "P" && cap.in_p > 0 {
                        cap.in_p -= 1;
                        if cap.in_p == 0 {
                            let text = cap.current_p.join(" ").trim().to_string();
                            if !text.is_empty() {
                                cap.paragraphs.push(text);
                            }
                        }
                    }

                    cap.rel_depth -= 1;
                    let finished = cap.rel_depth < 0;
                    if finished {
                        // End of the DIV8 itself.
                        if let Some(cap) = section.take() {
                            if let Some(doc) = finalize_section(cap, snapshot_date, title) {
                                sections.push(doc);
                            }
                        }
                    }
                } else if name.starts_with("DIV") {
                    stack.pop();
                }
            }

            Ok(_) => {}
        }
    }

    Ok(sections)
}

fn finalize_section(
    cap: SectionCapture,
    snapshot_date: &str,
    title: &TitleMeta,
) -> Option<EcfrSection> {
    let text = cap.paragraphs.join("\n\n").trim().to_string();
    if text.is_empty() {
        return None;
    }

    Some(EcfrSection {
        snapshot_date: snapshot_date.to_string(),
        source: "ecfr".to_string(),
        title: title.number.clone(),
        title_name: title.name.clone(),
        section: cap.n,
        part: cap.part,
        subpart: cap.subpart,
        heading: cap.head_parts.join(" ").trim().to_string(),
        citation: cap.citation,
        path: cap.path,
        node_type: "section".to_string(),
        text,
    })
}

// ============ Ingest driver ============

async fn fetch_titles(client: &reqwest::Client, base_url: &str) -> Result<Vec<TitleMeta>> {
    let url = format!("{}/api/versioner/v1/titles.json", base_url);
    let json: serde_json::Value = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()?
        .json()
        .await?;
    titles_from_json(&json)
}

/// Runs a full eCFR ingest into the given snapshot id, using `date` as the
/// point-in-time parameter of the versioner API.
pub async fn run_ingest_ecfr(config: &Config, snapshot_id: &str, date: &str) -> Result<()> {
    if Corpus::from_snapshot_id(snapshot_id) != Some(Corpus::Ecfr) {
        anyhow::bail!(
            "Snapshot id '{}' is not an eCFR snapshot (expected US-ECFR-YYYY-MM-DD)",
            snapshot_id
        );
    }

    let base = snapshot_dir(&config.snapshots.root, snapshot_id)?;
    let xml_dir = base.join("xml");
    std::fs::create_dir_all(&xml_dir)
        .with_context(|| format!("Failed to create {}", xml_dir.display()))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.ingest.timeout_secs))
        .build()?;

    println!("snapshot label: {}", snapshot_id);
    println!("ecfr api date:  {}", date);

    let titles = fetch_titles(&client, &config.ingest.ecfr_base_url).await?;
    println!("found {} titles", titles.len());

    let manifest_path = base.join("manifest.jsonl");
    let mut manifest = std::io::BufWriter::new(
        std::fs::File::create(&manifest_path)
            .with_context(|| format!("Failed to create {}", manifest_path.display()))?,
    );

    let mut total_sections = 0usize;

    for title in &titles {
        if is_reserved_title(&title.number) {
            println!("skipping title 35 (reserved)");
            continue;
        }

        let url = format!(
            "{}/api/versioner/v1/full/{}/title-{}.xml",
            config.ingest.ecfr_base_url, date, title.number
        );

        let xml = match client.get(&url).send().await.and_then(|r| r.error_for_status()) {
            Ok(resp) => resp.text().await?,
            Err(e) => {
                println!("failed to download title {}: {}", title.number, e);
                continue;
            }
        };

        let xml_path = xml_dir.join(format!("title-{}.xml", title.number));
        std::fs::write(&xml_path, &xml)
            .with_context(|| format!("Failed to write {}", xml_path.display()))?;

        let sections = parse_title_sections(&xml, date, title)?;
        println!("title {}: {} sections", title.number, sections.len());

        for doc in &sections {
            serde_json::to_writer(&mut manifest, doc)?;
            manifest.write_all(b"\n")?;
        }
        total_sections += sections.len();

        tokio::time::sleep(Duration::from_millis(config.ingest.title_delay_ms)).await;
    }

    manifest.flush()?;
    println!(
        "snapshot complete: {} ({} sections)",
        snapshot_id, total_sections
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DIV1 N="19" TYPE="TITLE">
  <DIV5 N="12" TYPE="PART">
    <HEAD>PART 12 - SPECIAL CLASSES OF MERCHANDISE</HEAD>
    <DIV6 N="A" TYPE="SUBPART">
      <DIV8 N="12.1" TYPE="SECTION" hierarchy_metadata='{"citation":"19 CFR 12.1","path":"/title-19/part-12/section-12.1"}'>
        <HEAD>&#xa7; 12.1 Joint regulations.</HEAD>
        <P>Certain <E>imported</E> articles are subject to joint regulation.</P>
        <P>Second paragraph of the section.</P>
      </DIV8>
      <DIV8 N="12.2" TYPE="SECTION">
        <HEAD>&#xa7; 12.2 [Reserved]</HEAD>
      </DIV8>
    </DIV6>
  </DIV5>
</DIV1>
"#;

    fn title19() -> TitleMeta {
        TitleMeta {
            number: "19".to_string(),
            name: Some("Customs Duties".to_string()),
        }
    }

    #[test]
    fn test_extracts_section_fields() {
        let docs = parse_title_sections(FIXTURE, "2025-10-18", &title19()).unwrap();
        assert_eq!(docs.len(), 1);

        let doc = &docs[0];
        assert_eq!(doc.section.as_deref(), Some("12.1"));
        assert_eq!(doc.part.as_deref(), Some("12"));
        assert_eq!(doc.subpart.as_deref(), Some("A"));
        assert_eq!(doc.citation.as_deref(), Some("19 CFR 12.1"));
        assert_eq!(doc.path.as_deref(), Some("/title-19/part-12/section-12.1"));
        assert_eq!(doc.title, "19");
        assert_eq!(doc.title_name.as_deref(), Some("Customs Duties"));
        assert_eq!(doc.node_type, "section");
        assert_eq!(doc.snapshot_date, "2025-10-18");
    }

    #[test]
    fn test_heading_and_paragraph_text() {
        let docs = parse_title_sections(FIXTURE, "2025-10-18", &title19()).unwrap();
        let doc = &docs[0];
        assert_eq!(doc.heading, "§ 12.1 Joint regulations.");
        // Inline markup inside <P> is flattened; paragraphs join with a
        // blank line.
        assert_eq!(
            doc.text,
            "Certain imported articles are subject to joint regulation.\n\nSecond paragraph of the section."
        );
    }

    #[test]
    fn test_empty_sections_dropped() {
        // 12.2 has a heading but no <P> body, so it must not appear.
        let docs = parse_title_sections(FIXTURE, "2025-10-18", &title19()).unwrap();
        assert!(docs.iter().all(|d| d.section.as_deref() != Some("12.2")));
    }

    #[test]
    fn test_reserved_title() {
        assert!(is_reserved_title("35"));
        assert!(!is_reserved_title("19"));
    }

    #[test]
    fn test_titles_from_json_both_key_shapes() {
        let json = serde_json::json!({
            "titles": [
                { "number": 19, "name": "Customs Duties" },
                { "title": "50", "name": "Wildlife and Fisheries" },
                { "name": "no number, skipped" },
            ]
        });
        let titles = titles_from_json(&json).unwrap();
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].number, "19");
        assert_eq!(titles[1].number, "50");
    }

    #[test]
    fn test_embed_text_includes_citation_and_heading() {
        let docs = parse_title_sections(FIXTURE, "2025-10-18", &title19()).unwrap();
        let text = docs[0].embed_text();
        assert!(text.starts_with("19 CFR 12.1 § 12.1 Joint regulations."));
        assert!(text.contains("\n\nCertain imported"));
    }
}
