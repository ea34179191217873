use crate::common::cursor::{ByteCursor, Endian};
use crate::common::types::{ColorRgba, Float2, Float3};
use crate::tds::types::{
    TdsAsset, TdsMaterial, TdsObject, CHUNK_COLOR_F32, CHUNK_COLOR_U8, CHUNK_EDIT, CHUNK_FACE_LIST,
    CHUNK_FACE_MATERIAL, CHUNK_MAP_FILENAME, CHUNK_MATERIAL, CHUNK_MATERIAL_DIFFUSE, CHUNK_MATERIAL_NAME,
    CHUNK_MATERIAL_SHININESS, CHUNK_MATERIAL_TEXMAP, CHUNK_OBJECT, CHUNK_PERCENT_U16, CHUNK_ROOT, CHUNK_TRIMESH,
    CHUNK_UV_LIST, CHUNK_VERTEX_LIST,
};
use crate::ParserError;

/// Chunk header: u16 tag + u32 total length, header included.
const CHUNK_HEADER_SIZE: usize = 6;

pub struct TdsReader {}

impl TdsReader {
    pub fn parse_asset(data: &[u8], file: &str) -> Result<TdsAsset, ParserError> {
        let mut cursor = ByteCursor::new(data, Endian::Little, file);
        let (tag, end) = Self::read_chunk_header(&mut cursor, data.len())?;
        if tag != CHUNK_ROOT {
            return Err(ParserError::UnrecognizedChunk {
                file: file.to_owned(),
                tag,
                offset: 0,
            });
        }

        let mut asset = TdsAsset::default();
        Self::scan_region(&mut cursor, end, |cursor, tag, child_end| match tag {
            CHUNK_EDIT => Self::parse_edit(cursor, child_end, &mut asset),
            // Unknown sections (keyframer and friends) are tolerated.
            _ => Ok(()),
        })?;

        Ok(asset)
    }

    /// Read one chunk header and compute the chunk's exclusive end, bounded by
    /// the enclosing region. A declared length that is smaller than the header
    /// or overruns the region is fatal, there is no best-effort recovery.
    fn read_chunk_header(cursor: &mut ByteCursor, end: usize) -> Result<(u16, usize), ParserError> {
        let begin = cursor.offset();
        if end - begin < CHUNK_HEADER_SIZE {
            return Err(ParserError::FormatError {
                file: cursor.label().to_owned(),
                reason: format!("truncated chunk header at offset {}", begin),
            });
        }

        let tag = cursor.read_u16()?;
        let length = cursor.read_u32()? as usize;
        if length < CHUNK_HEADER_SIZE {
            return Err(ParserError::FormatError {
                file: cursor.label().to_owned(),
                reason: format!("chunk {:#06x} at offset {} declares length {} smaller than its header", tag, begin, length),
            });
        }

        let child_end = begin + length;
        if child_end > end {
            return Err(ParserError::FormatError {
                file: cursor.label().to_owned(),
                reason: format!("chunk {:#06x} at offset {} declares length {} overrunning its region", tag, begin, length),
            });
        }

        Ok((tag, child_end))
    }

    /// Scan all chunks in `[cursor.offset(), end)`. Each handler receives the
    /// chunk's exclusive end and must never read past it; afterwards the
    /// cursor is forced to that end, so a handler that under-reads (or ignores
    /// the chunk entirely) cannot desynchronize its siblings.
    fn scan_region<'a, F>(cursor: &mut ByteCursor<'a>, end: usize, mut handle: F) -> Result<(), ParserError>
    where
        F: FnMut(&mut ByteCursor<'a>, u16, usize) -> Result<(), ParserError>,
    {
        while cursor.offset() < end {
            let (tag, child_end) = Self::read_chunk_header(cursor, end)?;
            handle(cursor, tag, child_end)?;
            cursor.set_offset(child_end);
        }
        Ok(())
    }

    fn parse_edit(cursor: &mut ByteCursor, end: usize, asset: &mut TdsAsset) -> Result<(), ParserError> {
        Self::scan_region(cursor, end, |cursor, tag, child_end| match tag {
            CHUNK_OBJECT => Self::parse_object(cursor, child_end, asset),
            CHUNK_MATERIAL => Self::parse_material(cursor, child_end, asset),
            _ => Ok(()),
        })
    }

    fn parse_object(cursor: &mut ByteCursor, end: usize, asset: &mut TdsAsset) -> Result<(), ParserError> {
        let name_bytes = cursor.read_cstring()?;
        let name = Self::utf8(cursor.label(), name_bytes, "object name")?;

        let mut object = TdsObject {
            name,
            ..Default::default()
        };
        Self::scan_region(cursor, end, |cursor, tag, child_end| match tag {
            CHUNK_TRIMESH => Self::parse_trimesh(cursor, child_end, &mut object),
            _ => Ok(()),
        })?;

        asset.objects.push(object);
        Ok(())
    }

    fn parse_trimesh(cursor: &mut ByteCursor, end: usize, object: &mut TdsObject) -> Result<(), ParserError> {
        Self::scan_region(cursor, end, |cursor, tag, child_end| match tag {
            CHUNK_VERTEX_LIST => {
                let count = cursor.read_u16()? as usize;
                Self::check_list_fits(cursor, child_end, count, 12, "vertex list")?;
                object.vertices.reserve(count);
                for _ in 0..count {
                    object.vertices.push(Float3 {
                        x: cursor.read_f32()?,
                        y: cursor.read_f32()?,
                        z: cursor.read_f32()?,
                    });
                }
                Ok(())
            }
            CHUNK_FACE_LIST => Self::parse_face_list(cursor, child_end, object),
            CHUNK_UV_LIST => {
                let count = cursor.read_u16()? as usize;
                Self::check_list_fits(cursor, child_end, count, 8, "UV list")?;
                object.uvs.reserve(count);
                for _ in 0..count {
                    let x = cursor.read_f32()?;
                    // The stored V axis points the other way.
                    let y = 1.0 - cursor.read_f32()?;
                    object.uvs.push(Float2 { x, y });
                }
                Ok(())
            }
            _ => Ok(()),
        })
    }

    fn parse_face_list(cursor: &mut ByteCursor, end: usize, object: &mut TdsObject) -> Result<(), ParserError> {
        let count = cursor.read_u16()? as usize;
        Self::check_list_fits(cursor, end, count, 8, "face list")?;
        object.faces.reserve(count);
        for _ in 0..count {
            let a = cursor.read_u16()?;
            let b = cursor.read_u16()?;
            let c = cursor.read_u16()?;
            let _face_info = cursor.read_u16()?;
            object.faces.push([a, b, c]);
        }

        // Material assignments trail the face records. Only the name matters;
        // the per-face index list is skipped by the scan discipline.
        Self::scan_region(cursor, end, |cursor, tag, _child_end| match tag {
            CHUNK_FACE_MATERIAL => {
                let name_bytes = cursor.read_cstring()?;
                let name = Self::utf8(cursor.label(), name_bytes, "material assignment name")?;
                let _face_count = cursor.read_u16()?;
                object.material_name = Some(name);
                Ok(())
            }
            _ => Ok(()),
        })
    }

    fn parse_material(cursor: &mut ByteCursor, end: usize, asset: &mut TdsAsset) -> Result<(), ParserError> {
        let mut material = TdsMaterial::default();
        Self::scan_region(cursor, end, |cursor, tag, child_end| match tag {
            CHUNK_MATERIAL_NAME => {
                let name_bytes = cursor.read_cstring()?;
                material.name = Self::utf8(cursor.label(), name_bytes, "material name")?;
                Ok(())
            }
            CHUNK_MATERIAL_DIFFUSE => {
                material.diffuse = Some(Self::parse_color(cursor, child_end)?);
                Ok(())
            }
            CHUNK_MATERIAL_SHININESS => {
                material.shininess = Self::parse_percent(cursor, child_end)?;
                Ok(())
            }
            CHUNK_MATERIAL_TEXMAP => Self::parse_texture_map(cursor, child_end, &mut material),
            _ => Ok(()),
        })?;

        if material.name.is_empty() {
            return Err(ParserError::FormatError {
                file: cursor.label().to_owned(),
                reason: "material definition without a name chunk".to_owned(),
            });
        }

        asset.materials.push(material);
        Ok(())
    }

    /// Color chunks come in two encodings, float RGB and byte RGB. Either way
    /// the result is normalized to [0, 1] with alpha forced to opaque.
    fn parse_color(cursor: &mut ByteCursor, end: usize) -> Result<ColorRgba, ParserError> {
        let mut color = None;
        Self::scan_region(cursor, end, |cursor, tag, _child_end| {
            match tag {
                CHUNK_COLOR_F32 => {
                    color = Some(ColorRgba::clamped(
                        cursor.read_f32()?,
                        cursor.read_f32()?,
                        cursor.read_f32()?,
                        1.0,
                    ));
                }
                CHUNK_COLOR_U8 => {
                    color = Some(ColorRgba::clamped(
                        cursor.read_u8()? as f32 / 255.0,
                        cursor.read_u8()? as f32 / 255.0,
                        cursor.read_u8()? as f32 / 255.0,
                        1.0,
                    ));
                }
                _ => (),
            }
            Ok(())
        })?;

        color.ok_or_else(|| ParserError::FormatError {
            file: cursor.label().to_owned(),
            reason: "color chunk without a recognized encoding".to_owned(),
        })
    }

    fn parse_percent(cursor: &mut ByteCursor, end: usize) -> Result<Option<f32>, ParserError> {
        let mut percent = None;
        Self::scan_region(cursor, end, |cursor, tag, _child_end| {
            if tag == CHUNK_PERCENT_U16 {
                percent = Some(cursor.read_u16()? as f32);
            }
            Ok(())
        })?;
        Ok(percent)
    }

    fn parse_texture_map(cursor: &mut ByteCursor, end: usize, material: &mut TdsMaterial) -> Result<(), ParserError> {
        Self::scan_region(cursor, end, |cursor, tag, _child_end| {
            if tag == CHUNK_MAP_FILENAME {
                let path_bytes = cursor.read_cstring()?;
                material.texture_path = Some(Self::utf8(cursor.label(), path_bytes, "texture map path")?);
            }
            Ok(())
        })
    }

    /// A handler must never read past its chunk's declared end; counted lists
    /// are validated against that bound up front.
    fn check_list_fits(cursor: &ByteCursor, end: usize, count: usize, record_size: usize, what: &str) -> Result<(), ParserError> {
        let needed = count * record_size;
        if cursor.offset() + needed > end {
            return Err(ParserError::FormatError {
                file: cursor.label().to_owned(),
                reason: format!("{} of {} records does not fit its chunk", what, count),
            });
        }
        Ok(())
    }

    fn utf8(file: &str, bytes: &[u8], what: &str) -> Result<String, ParserError> {
        String::from_utf8(bytes.to_vec()).map_err(|_| ParserError::FormatError {
            file: file.to_owned(),
            reason: format!("{} is not valid UTF-8", what),
        })
    }
}
