//! ロゴ画像の埋め込み
//!
//! 画像は加工せずそのまま xl/media に置き、指定セルを左上にした
//! oneCellAnchor で原寸表示する。シートに既存の描画パーツがあればそこに追記する。

use super::package::{
    attribute, parse_relationships, relative_target, rels_path_for, resolve_target, Package,
};
use super::sheet;
use super::PackageError;
use crate::cell::CellRef;
use crate::error::{Error, Result};
use image::{ImageFormat, ImageReader};
use quick_xml::events::{BytesEnd, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

const XDR_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const REL_TYPE_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
const REL_TYPE_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const DRAWING_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";

/// 96dpi での 1px
const EMU_PER_PIXEL: u64 = 9525;

/// 埋め込める画像形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoFormat {
    Png,
    Jpeg,
}

impl LogoFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            LogoFormat::Png => "png",
            LogoFormat::Jpeg => "jpeg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            LogoFormat::Png => "image/png",
            LogoFormat::Jpeg => "image/jpeg",
        }
    }
}

/// ロゴ画像（形式と原寸を確認済み）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoImage {
    bytes: Vec<u8>,
    format: LogoFormat,
    width: u32,
    height: u32,
}

impl LogoImage {
    /// 画像のヘッダーだけ読んで形式とサイズを確認する
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let reader = ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| Error::UnsupportedImage(e.to_string()))?;

        let format = match reader.format() {
            Some(ImageFormat::Png) => LogoFormat::Png,
            Some(ImageFormat::Jpeg) => LogoFormat::Jpeg,
            Some(other) => {
                return Err(Error::UnsupportedImage(format!(
                    "{:?} 形式には対応していません（PNG / JPEG のみ）",
                    other
                )))
            }
            None => return Err(Error::UnsupportedImage("画像形式を判別できません".to_string())),
        };

        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| Error::UnsupportedImage(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(Error::UnsupportedImage("画像サイズが0です".to_string()));
        }

        Ok(Self {
            bytes,
            format,
            width,
            height,
        })
    }

    pub fn format(&self) -> LogoFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 原寸の EMU (cx, cy)
    pub fn emu_size(&self) -> (u64, u64) {
        (
            self.width as u64 * EMU_PER_PIXEL,
            self.height as u64 * EMU_PER_PIXEL,
        )
    }
}

/// シートにロゴを埋め込む
pub fn embed_logo(
    package: &mut Package,
    sheet_path: &str,
    logo: &LogoImage,
    anchor: CellRef,
) -> std::result::Result<(), PackageError> {
    let existing = existing_drawing(package, sheet_path)?;

    let media = package.next_free_part(
        "xl/media/image",
        &format!(".{}", logo.format.extension()),
    );
    package.set_part(media.clone(), logo.bytes.clone());
    package.ensure_default_content_type(logo.format.extension(), logo.format.content_type())?;

    let drawing_path = match existing {
        Some(path) => path,
        None => {
            let path = package.next_free_part("xl/drawings/drawing", ".xml");
            package.set_part(path.clone(), empty_drawing_xml());
            package.ensure_override_content_type(&path, DRAWING_CONTENT_TYPE)?;
            let rel_id = package.add_relationship(
                sheet_path,
                REL_TYPE_DRAWING,
                &relative_target(sheet_path, &path),
            )?;
            let updated = sheet::insert_drawing(package.require_part(sheet_path)?, &rel_id)?;
            package.set_part(sheet_path, updated);
            path
        }
    };

    let image_rel = package.add_relationship(
        &drawing_path,
        REL_TYPE_IMAGE,
        &relative_target(&drawing_path, &media),
    )?;

    let drawing_xml = package.require_part(&drawing_path)?;
    let object_id = next_object_id(drawing_xml)?;
    let anchor_xml = one_cell_anchor_xml(anchor, logo.emu_size(), object_id, &image_rel);
    let updated = append_anchor(drawing_xml, &anchor_xml)?;
    package.set_part(drawing_path, updated);
    Ok(())
}

/// シートが既に参照している描画パーツ
fn existing_drawing(
    package: &Package,
    sheet_path: &str,
) -> std::result::Result<Option<String>, PackageError> {
    let Some(rel_id) = sheet::drawing_rel_id(package.require_part(sheet_path)?)? else {
        return Ok(None);
    };

    let rels = match package.part(&rels_path_for(sheet_path)) {
        Some(xml) => parse_relationships(xml)?,
        None => Vec::new(),
    };
    let path = rels
        .iter()
        .find(|r| r.id == rel_id)
        .map(|r| resolve_target(sheet_path, &r.target))
        .filter(|path| package.has_part(path))
        .ok_or_else(|| {
            PackageError::Invalid(format!("描画パーツ {} が見つかりません", rel_id))
        })?;
    Ok(Some(path))
}

fn empty_drawing_xml() -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><xdr:wsDr xmlns:xdr="{}" xmlns:a="{}"></xdr:wsDr>"#,
        XDR_NS, A_NS
    )
    .into_bytes()
}

fn next_object_id(drawing_xml: &[u8]) -> std::result::Result<u32, PackageError> {
    let mut reader = Reader::from_reader(drawing_xml);
    let mut buf = Vec::new();
    let mut max = 0u32;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"cNvPr" => {
                if let Some(id) = attribute(e, b"id")?.and_then(|id| id.parse::<u32>().ok()) {
                    max = max.max(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(max + 1)
}

/// 名前空間はアンカー要素で宣言する（既存パーツのルート宣言に依存しない）
fn one_cell_anchor_xml(anchor: CellRef, (cx, cy): (u64, u64), object_id: u32, embed: &str) -> String {
    format!(
        concat!(
            r#"<xdr:oneCellAnchor xmlns:xdr="{xdr}" xmlns:a="{a}" xmlns:r="{r}">"#,
            r#"<xdr:from><xdr:col>{col}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{row}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>"#,
            r#"<xdr:ext cx="{cx}" cy="{cy}"/>"#,
            r#"<xdr:pic><xdr:nvPicPr><xdr:cNvPr id="{id}" name="Picture {id}"/><xdr:cNvPicPr><a:picLocks noChangeAspect="1"/></xdr:cNvPicPr></xdr:nvPicPr>"#,
            r#"<xdr:blipFill><a:blip r:embed="{embed}"/><a:stretch><a:fillRect/></a:stretch></xdr:blipFill>"#,
            r#"<xdr:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></xdr:spPr></xdr:pic>"#,
            r#"<xdr:clientData/></xdr:oneCellAnchor>"#
        ),
        xdr = XDR_NS,
        a = A_NS,
        r = super::package::REL_NS,
        col = anchor.col,
        row = anchor.row,
        cx = cx,
        cy = cy,
        id = object_id,
        embed = embed,
    )
}

/// wsDr の閉じタグ直前にアンカーを足す
fn append_anchor(drawing_xml: &[u8], anchor_xml: &str) -> std::result::Result<Vec<u8>, PackageError> {
    let mut reader = Reader::from_reader(drawing_xml);
    let mut writer = Writer::new(Vec::with_capacity(drawing_xml.len() + anchor_xml.len()));
    let mut buf = Vec::new();
    let mut appended = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::End(ref e) if !appended && e.local_name().as_ref() == b"wsDr" => {
                writer.get_mut().extend_from_slice(anchor_xml.as_bytes());
                writer.write_event(Event::End(e.to_owned()))?;
                appended = true;
            }
            Event::Empty(ref e) if !appended && e.local_name().as_ref() == b"wsDr" => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                writer.get_mut().extend_from_slice(anchor_xml.as_bytes());
                writer.write_event(Event::End(BytesEnd::new(name)))?;
                appended = true;
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    if !appended {
        return Err(PackageError::Invalid("wsDr 要素がありません".to_string()));
    }
    Ok(writer.into_inner())
}
