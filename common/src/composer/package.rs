//! xlsx パッケージ（zip）の読み書きと、ブック全体に関わる部品の更新
//!
//! - パーツ名 → バイト列 の対応表として保持する
//! - 対象シートはアクティブシート（workbookView の activeTab）
//! - 書き出し時は calcChain を捨てて fullCalcOnLoad を立てる

use super::PackageError;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

pub const REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE_CALC_CHAIN: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain";

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

/// workbook.xml で calcPr より後ろに来る要素
const AFTER_CALC_PR: &[&[u8]] = &[
    b"oleSize",
    b"customWorkbookViews",
    b"pivotCaches",
    b"smartTagPr",
    b"smartTagTypes",
    b"webPublishing",
    b"fileRecoveryPr",
    b"webPublishObjects",
    b"extLst",
];

/// リレーションシップ1件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_: String,
    pub target: String,
}

/// 対象シートのパーツ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPart {
    pub name: String,
    pub path: String,
}

/// 展開済みの xlsx パッケージ
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PackageError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = BTreeMap::new();

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            parts.insert(name, buf);
        }

        if !parts.contains_key(WORKBOOK_PART) {
            return Err(PackageError::MissingPart(WORKBOOK_PART.to_string()));
        }
        Ok(Self { parts })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PackageError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn require_part(&self, name: &str) -> Result<&[u8], PackageError> {
        self.part(name)
            .ok_or_else(|| PackageError::MissingPart(name.to_string()))
    }

    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// `prefix{N}{suffix}` の形で未使用のパーツ名を返す（N は1から）
    pub fn next_free_part(&self, prefix: &str, suffix: &str) -> String {
        (1..)
            .map(|n| format!("{}{}{}", prefix, n, suffix))
            .find(|name| !self.parts.contains_key(name))
            .unwrap_or_else(|| format!("{}{}", prefix, suffix))
    }

    /// アクティブシート（なければ先頭シート）
    pub fn active_sheet(&self) -> Result<SheetPart, PackageError> {
        let workbook = self.require_part(WORKBOOK_PART)?;
        let (active_tab, sheets) = parse_workbook(workbook)?;

        let (name, rel_id) = sheets
            .get(active_tab)
            .or_else(|| sheets.first())
            .cloned()
            .ok_or_else(|| PackageError::Invalid("ブックにシートがありません".to_string()))?;

        let rels = parse_relationships(self.require_part(WORKBOOK_RELS_PART)?)?;
        let rel = rels
            .iter()
            .find(|r| r.id == rel_id)
            .ok_or_else(|| PackageError::Invalid(format!("シート '{}' の参照先がありません", name)))?;

        let path = resolve_target(WORKBOOK_PART, &rel.target);
        if !self.has_part(&path) {
            return Err(PackageError::MissingPart(path));
        }
        Ok(SheetPart { name, path })
    }

    /// 数式を書き換えたので、開いたときに全再計算させる
    pub fn force_full_calc(&mut self) -> Result<(), PackageError> {
        let workbook = self.require_part(WORKBOOK_PART)?;
        let updated = workbook_full_calc_on_load(workbook)?;
        self.set_part(WORKBOOK_PART, updated);

        self.parts.remove(CALC_CHAIN_PART);
        if let Some(rels) = self.part(WORKBOOK_RELS_PART) {
            let updated = remove_relationships(rels, |r| {
                r.type_ == REL_TYPE_CALC_CHAIN || r.target.ends_with("calcChain.xml")
            })?;
            self.set_part(WORKBOOK_RELS_PART, updated);
        }
        if let Some(types) = self.part(CONTENT_TYPES_PART) {
            let updated = remove_override(types, "/xl/calcChain.xml")?;
            self.set_part(CONTENT_TYPES_PART, updated);
        }
        Ok(())
    }

    /// パーツにリレーションシップを追加し、採番した rId を返す
    pub fn add_relationship(
        &mut self,
        source_part: &str,
        type_: &str,
        target: &str,
    ) -> Result<String, PackageError> {
        let rels_path = rels_path_for(source_part);
        let existing = match self.part(&rels_path) {
            Some(xml) => parse_relationships(xml)?,
            None => Vec::new(),
        };
        let id = next_rel_id(&existing);
        let rel = Relationship {
            id: id.clone(),
            type_: type_.to_string(),
            target: target.to_string(),
        };

        let updated = match self.part(&rels_path) {
            Some(xml) => append_relationship(xml, &rel)?,
            None => new_relationships_xml(&[rel]),
        };
        self.set_part(rels_path, updated);
        Ok(id)
    }

    /// 拡張子の既定コンテンツタイプを登録する（既にあれば何もしない）
    pub fn ensure_default_content_type(
        &mut self,
        extension: &str,
        content_type: &str,
    ) -> Result<(), PackageError> {
        let types = self.require_part(CONTENT_TYPES_PART)?;
        let has = content_types_entries(types, b"Default", b"Extension")?
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension));
        if has {
            return Ok(());
        }

        let mut element = BytesStart::new("Default");
        element.push_attribute(("Extension", extension));
        element.push_attribute(("ContentType", content_type));
        let updated = insert_before_end(types, b"Types", element)?;
        self.set_part(CONTENT_TYPES_PART, updated);
        Ok(())
    }

    /// パーツ個別のコンテンツタイプを登録する
    pub fn ensure_override_content_type(
        &mut self,
        part: &str,
        content_type: &str,
    ) -> Result<(), PackageError> {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        let types = self.require_part(CONTENT_TYPES_PART)?;
        let has = content_types_entries(types, b"Override", b"PartName")?
            .iter()
            .any(|name| *name == part_name);
        if has {
            return Ok(());
        }

        let mut element = BytesStart::new("Override");
        element.push_attribute(("PartName", part_name.as_str()));
        element.push_attribute(("ContentType", content_type));
        let updated = insert_before_end(types, b"Types", element)?;
        self.set_part(CONTENT_TYPES_PART, updated);
        Ok(())
    }
}

/// `xl/worksheets/sheet1.xml` → `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// リレーションシップの Target をパッケージ内の絶対パーツ名にする
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// `from_part` から `to_part` を指す相対パス
pub fn relative_target(from_part: &str, to_part: &str) -> String {
    let from_dir: Vec<&str> = match from_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let to: Vec<&str> = to_part.split('/').collect();

    let common = from_dir
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out: Vec<&str> = std::iter::repeat("..").take(from_dir.len() - common).collect();
    out.extend(&to[common..]);
    out.join("/")
}

pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, PackageError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"Relationship" => {
                rels.push(relationship_from(e)?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

fn relationship_from(e: &BytesStart<'_>) -> Result<Relationship, PackageError> {
    let mut rel = Relationship {
        id: String::new(),
        type_: String::new(),
        target: String::new(),
    };
    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.as_ref() {
            b"Id" => rel.id = value,
            b"Type" => rel.type_ = value,
            b"Target" => rel.target = value,
            _ => {}
        }
    }
    Ok(rel)
}

/// 未使用の rId
pub fn next_rel_id(rels: &[Relationship]) -> String {
    let max = rels
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

fn new_relationships_xml(rels: &[Relationship]) -> Vec<u8> {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(&format!(r#"<Relationships xmlns="{}">"#, PKG_REL_NS));
    for rel in rels {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            rel.id, rel.type_, rel.target
        ));
    }
    xml.push_str("</Relationships>");
    xml.into_bytes()
}

fn append_relationship(xml: &[u8], rel: &Relationship) -> Result<Vec<u8>, PackageError> {
    let mut element = BytesStart::new("Relationship");
    element.push_attribute(("Id", rel.id.as_str()));
    element.push_attribute(("Type", rel.type_.as_str()));
    element.push_attribute(("Target", rel.target.as_str()));
    insert_before_end(xml, b"Relationships", element)
}

fn remove_relationships(
    xml: &[u8],
    remove: impl Fn(&Relationship) -> bool,
) -> Result<Vec<u8>, PackageError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut skipping = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(ref e) if e.local_name().as_ref() == b"Relationship" => {
                if remove(&relationship_from(e)?) {
                    skipping = true;
                } else {
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"Relationship" => {
                if !remove(&relationship_from(e)?) {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                }
            }
            Event::End(ref e) if skipping && e.local_name().as_ref() == b"Relationship" => {
                skipping = false;
            }
            ev if skipping => drop(ev),
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }
    Ok(writer.into_inner())
}

fn remove_override(xml: &[u8], part_name: &str) -> Result<Vec<u8>, PackageError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(ref e) if e.local_name().as_ref() == b"Override" => {
                if attribute(e, b"PartName")?.as_deref() != Some(part_name) {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                }
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }
    Ok(writer.into_inner())
}

fn content_types_entries(
    xml: &[u8],
    element: &[u8],
    key: &[u8],
) -> Result<Vec<String>, PackageError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut values = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == element => {
                if let Some(value) = attribute(e, key)? {
                    values.push(value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(values)
}

/// ルート要素の閉じタグ直前に空要素を1つ差し込む
fn insert_before_end(
    xml: &[u8],
    root: &[u8],
    element: BytesStart<'_>,
) -> Result<Vec<u8>, PackageError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 128));
    let mut buf = Vec::new();
    let mut inserted = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::End(ref e) if !inserted && e.local_name().as_ref() == root => {
                writer.write_event(Event::Empty(element.borrow()))?;
                writer.write_event(Event::End(e.to_owned()))?;
                inserted = true;
            }
            Event::Empty(ref e) if !inserted && e.local_name().as_ref() == root => {
                writer.write_event(Event::Start(e.to_owned()))?;
                writer.write_event(Event::Empty(element.borrow()))?;
                writer.write_event(Event::End(BytesEnd::new(
                    String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                )))?;
                inserted = true;
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    if !inserted {
        return Err(PackageError::Invalid(format!(
            "<{}> が見つかりません",
            String::from_utf8_lossy(root)
        )));
    }
    Ok(writer.into_inner())
}

pub(crate) fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, PackageError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// (activeTab, [(シート名, r:id)])
fn parse_workbook(xml: &[u8]) -> Result<(usize, Vec<(String, String)>), PackageError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut active_tab = 0usize;
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"workbookView" => {
                    if let Some(tab) = attribute(e, b"activeTab")? {
                        active_tab = tab.parse().unwrap_or(0);
                    }
                }
                b"sheet" => {
                    let mut name = String::new();
                    let mut rel_id = String::new();
                    for attr in e.attributes() {
                        let attr = attr?;
                        if attr.key.as_ref() == b"name" {
                            name = attr.unescape_value()?.into_owned();
                        } else if attr.key.local_name().as_ref() == b"id"
                            && attr.key.prefix().is_some()
                        {
                            rel_id = attr.unescape_value()?.into_owned();
                        }
                    }
                    sheets.push((name, rel_id));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok((active_tab, sheets))
}

fn workbook_full_calc_on_load(xml: &[u8]) -> Result<Vec<u8>, PackageError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 64));
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut done = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(ref e) if e.local_name().as_ref() == b"calcPr" => {
                writer.write_event(Event::Empty(full_calc_pr(Some(e))?))?;
                done = true;
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"calcPr" => {
                writer.write_event(Event::Start(full_calc_pr(Some(e))?))?;
                depth += 1;
                done = true;
            }
            Event::Start(ref e) => {
                if !done && depth == 1 && AFTER_CALC_PR.contains(&e.local_name().as_ref()) {
                    writer.write_event(Event::Empty(full_calc_pr(None)?))?;
                    done = true;
                }
                writer.write_event(Event::Start(e.to_owned()))?;
                depth += 1;
            }
            Event::Empty(ref e) => {
                if !done && depth == 1 && AFTER_CALC_PR.contains(&e.local_name().as_ref()) {
                    writer.write_event(Event::Empty(full_calc_pr(None)?))?;
                    done = true;
                }
                writer.write_event(Event::Empty(e.to_owned()))?;
            }
            Event::End(ref e) => {
                if !done && depth == 1 && e.local_name().as_ref() == b"workbook" {
                    writer.write_event(Event::Empty(full_calc_pr(None)?))?;
                    done = true;
                }
                writer.write_event(Event::End(e.to_owned()))?;
                depth = depth.saturating_sub(1);
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }
    Ok(writer.into_inner())
}

fn full_calc_pr(existing: Option<&BytesStart<'_>>) -> Result<BytesStart<'static>, PackageError> {
    let name = existing
        .map(|e| String::from_utf8_lossy(e.name().as_ref()).into_owned())
        .unwrap_or_else(|| "calcPr".to_string());
    let mut calc_pr = BytesStart::new(name);
    if let Some(e) = existing {
        for attr in e.attributes() {
            let attr = attr?;
            if attr.key.as_ref() == b"fullCalcOnLoad" {
                continue;
            }
            calc_pr.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    calc_pr.push_attribute(("fullCalcOnLoad", "1"));
    Ok(calc_pr)
}
