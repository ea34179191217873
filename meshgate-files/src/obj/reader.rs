use std::collections::HashMap;

use crate::common::types::{ColorRgba, Float2, Float3};
use crate::obj::types::{MtlMaterial, ObjAsset, ObjGroup};
use crate::ParserError;

/// A face corner, decremented to 0-based indices into the global tables.
#[derive(Debug, Copy, Clone)]
struct FaceRef {
    position: usize,
    coordinate: Option<usize>,
    normal: Option<usize>,
}

pub struct ObjReader {}

impl ObjReader {
    /// Parse the line-oriented geometry format. When `object_filter` is set,
    /// every directive is still parsed (so errors keep accurate line numbers)
    /// but faces and material bindings only apply while the current object
    /// name matches. The position/coordinate/normal tables are file-global
    /// lookup tables and always accumulate.
    pub fn parse_geometry(text: &str, file: &str, object_filter: Option<&str>) -> Result<ObjAsset, ParserError> {
        let mut builder = GeometryBuilder::new(file);
        let mut libraries: Vec<String> = Vec::new();
        let mut current_object: Option<String> = None;

        for (line_index, line) in text.lines().enumerate() {
            let line_number = line_index + 1;
            let mut tokens = line.split(['\t', ' ']).filter(|token| !token.is_empty());
            let Some(directive) = tokens.next() else {
                continue;
            };
            if directive.starts_with('#') {
                continue;
            }

            let applies = object_filter.is_none() || current_object.as_deref() == object_filter;
            match directive {
                "v" => {
                    let position = Self::parse_float3(&mut tokens, file, line_number)?;
                    builder.positions.push(position);
                }
                "vn" => {
                    let normal = Self::parse_float3(&mut tokens, file, line_number)?;
                    builder.normals.push(normal);
                }
                "vt" => {
                    let coordinate = Self::parse_float2(&mut tokens, file, line_number)?;
                    builder.coordinates.push(coordinate);
                }
                "f" => {
                    let refs = tokens
                        .map(|token| Self::parse_face_ref(token, file, line_number))
                        .collect::<Result<Vec<_>, _>>()?;
                    if refs.len() < 3 {
                        return Err(ParserError::FormatError {
                            file: file.to_owned(),
                            reason: format!("line {}: face with fewer than 3 vertices", line_number),
                        });
                    }
                    if applies {
                        builder.add_face(&refs, line_number)?;
                    }
                }
                "usemtl" => {
                    let name = Self::required_token(&mut tokens, directive, file, line_number)?;
                    if applies {
                        builder.bind_material(name.to_owned());
                    }
                }
                "mtllib" => {
                    let mut any = false;
                    for library in tokens {
                        libraries.push(library.to_owned());
                        any = true;
                    }
                    if !any {
                        return Err(Self::missing_argument(directive, file, line_number));
                    }
                }
                "o" => {
                    let name = tokens.collect::<Vec<_>>().join(" ");
                    if name.is_empty() {
                        return Err(Self::missing_argument(directive, file, line_number));
                    }
                    current_object = Some(name);
                }
                // Smoothing groups are accepted and ignored.
                "s" => {}
                _ => {
                    return Err(ParserError::UnrecognizedDirective {
                        file: file.to_owned(),
                        line: line_number,
                        directive: directive.to_owned(),
                    });
                }
            }
        }

        let groups = builder.finish();
        Ok(ObjAsset {
            groups,
            material_libraries: libraries,
        })
    }

    /// Parse a companion material library.
    pub fn parse_material_library(text: &str, file: &str) -> Result<Vec<MtlMaterial>, ParserError> {
        let mut materials: Vec<MtlMaterial> = Vec::new();

        for (line_index, line) in text.lines().enumerate() {
            let line_number = line_index + 1;
            let mut tokens = line.split(['\t', ' ']).filter(|token| !token.is_empty());
            let Some(directive) = tokens.next() else {
                continue;
            };
            if directive.starts_with('#') {
                continue;
            }

            if directive == "newmtl" {
                let name = Self::required_token(&mut tokens, directive, file, line_number)?;
                materials.push(MtlMaterial {
                    name: name.to_owned(),
                    ..Default::default()
                });
                continue;
            }

            // Tolerated the way the geometry format tolerates smoothing groups.
            if matches!(directive, "Ka" | "d" | "illum") {
                continue;
            }

            let current = materials.last_mut().ok_or_else(|| ParserError::FormatError {
                file: file.to_owned(),
                reason: format!("line {}: directive '{}' before any newmtl", line_number, directive),
            })?;

            match directive {
                "Kd" => current.diffuse = Some(Self::parse_color(&mut tokens, file, line_number)?),
                "Ks" => current.specular = Some(Self::parse_color(&mut tokens, file, line_number)?),
                "Ke" => current.emissive = Some(Self::parse_color(&mut tokens, file, line_number)?),
                "Ns" => {
                    let token = Self::required_token(&mut tokens, directive, file, line_number)?;
                    current.shininess = Some(Self::parse_f32(token, file, line_number)?);
                }
                "map_Kd" => current.diffuse_map = Some(Self::map_path(&mut tokens, directive, file, line_number)?),
                "map_Ke" => current.emissive_map = Some(Self::map_path(&mut tokens, directive, file, line_number)?),
                "map_Bump" | "bump" => {
                    current.normal_map = Some(Self::map_path(&mut tokens, directive, file, line_number)?)
                }
                "disp" => current.height_map = Some(Self::map_path(&mut tokens, directive, file, line_number)?),
                _ => {
                    return Err(ParserError::UnrecognizedDirective {
                        file: file.to_owned(),
                        line: line_number,
                        directive: directive.to_owned(),
                    });
                }
            }
        }

        Ok(materials)
    }

    fn parse_face_ref(token: &str, file: &str, line: usize) -> Result<FaceRef, ParserError> {
        let mut parts = token.split('/');
        let position = Self::parse_index(parts.next().unwrap_or(""), file, line)?;
        let coordinate = match parts.next() {
            None | Some("") => None,
            Some(part) => Some(Self::parse_index(part, file, line)?),
        };
        let normal = match parts.next() {
            None | Some("") => None,
            Some(part) => Some(Self::parse_index(part, file, line)?),
        };
        if parts.next().is_some() {
            return Err(ParserError::FormatError {
                file: file.to_owned(),
                reason: format!("line {}: face reference '{}' has too many components", line, token),
            });
        }
        Ok(FaceRef {
            position,
            coordinate,
            normal,
        })
    }

    /// Face references are 1-based; 0 or negative after the decrement is
    /// invalid.
    fn parse_index(text: &str, file: &str, line: usize) -> Result<usize, ParserError> {
        let value: i64 = text.parse().map_err(|_| ParserError::FormatError {
            file: file.to_owned(),
            reason: format!("line {}: invalid face index '{}'", line, text),
        })?;
        if value <= 0 {
            return Err(ParserError::FormatError {
                file: file.to_owned(),
                reason: format!("line {}: face index {} is not a positive 1-based index", line, value),
            });
        }
        Ok((value - 1) as usize)
    }

    fn parse_f32(token: &str, file: &str, line: usize) -> Result<f32, ParserError> {
        token.parse().map_err(|_| ParserError::FormatError {
            file: file.to_owned(),
            reason: format!("line {}: invalid number '{}'", line, token),
        })
    }

    fn parse_float3<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
        file: &str,
        line: usize,
    ) -> Result<Float3, ParserError> {
        let mut components = [0f32; 3];
        for component in &mut components {
            let token = tokens.next().ok_or_else(|| ParserError::FormatError {
                file: file.to_owned(),
                reason: format!("line {}: expected 3 components", line),
            })?;
            *component = Self::parse_f32(token, file, line)?;
        }
        Ok(Float3 {
            x: components[0],
            y: components[1],
            z: components[2],
        })
    }

    fn parse_float2<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
        file: &str,
        line: usize,
    ) -> Result<Float2, ParserError> {
        let mut components = [0f32; 2];
        for component in &mut components {
            let token = tokens.next().ok_or_else(|| ParserError::FormatError {
                file: file.to_owned(),
                reason: format!("line {}: expected 2 components", line),
            })?;
            *component = Self::parse_f32(token, file, line)?;
        }
        Ok(Float2 {
            x: components[0],
            y: components[1],
        })
    }

    fn parse_color<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
        file: &str,
        line: usize,
    ) -> Result<ColorRgba, ParserError> {
        let rgb = Self::parse_float3(tokens, file, line)?;
        Ok(ColorRgba {
            r: rgb.x,
            g: rgb.y,
            b: rgb.z,
            a: 1.0,
        })
    }

    /// Texture map statements may carry options before the file name; the
    /// path is the last token.
    fn map_path<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
        directive: &str,
        file: &str,
        line: usize,
    ) -> Result<String, ParserError> {
        tokens
            .last()
            .map(str::to_owned)
            .ok_or_else(|| Self::missing_argument(directive, file, line))
    }

    fn required_token<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
        directive: &str,
        file: &str,
        line: usize,
    ) -> Result<&'a str, ParserError> {
        tokens.next().ok_or_else(|| Self::missing_argument(directive, file, line))
    }

    fn missing_argument(directive: &str, file: &str, line: usize) -> ParserError {
        ParserError::FormatError {
            file: file.to_owned(),
            reason: format!("line {}: directive '{}' is missing its argument", line, directive),
        }
    }
}

/// Accumulates polygon groups: one per contiguous material binding, each with
/// its own vertex arrays deduplicated by (position, coordinate, normal) key.
struct GeometryBuilder<'a> {
    file: &'a str,
    positions: Vec<Float3>,
    normals: Vec<Float3>,
    coordinates: Vec<Float2>,
    groups: Vec<ObjGroup>,
    current: ObjGroup,
    slots: HashMap<(usize, Option<usize>, Option<usize>), u32>,
    group_has_coordinates: bool,
    group_has_normals: bool,
}

impl<'a> GeometryBuilder<'a> {
    fn new(file: &'a str) -> GeometryBuilder<'a> {
        GeometryBuilder {
            file,
            positions: Vec::new(),
            normals: Vec::new(),
            coordinates: Vec::new(),
            groups: Vec::new(),
            current: ObjGroup::default(),
            slots: HashMap::new(),
            group_has_coordinates: false,
            group_has_normals: false,
        }
    }

    /// A material binding starts a new group once the previous one has faces.
    fn bind_material(&mut self, name: String) {
        if !self.current.triangles.is_empty() {
            self.close_group();
        }
        self.current.material = Some(name);
    }

    /// Fan an N-vertex face into N-2 triangles over deduplicated slots.
    fn add_face(&mut self, refs: &[FaceRef], line: usize) -> Result<(), ParserError> {
        let slots = refs
            .iter()
            .map(|corner| self.slot_for(corner, line))
            .collect::<Result<Vec<_>, _>>()?;

        for i in 0..slots.len() - 2 {
            self.current.triangles.push([slots[0], slots[i + 1], slots[i + 2]]);
        }
        Ok(())
    }

    fn slot_for(&mut self, corner: &FaceRef, line: usize) -> Result<u32, ParserError> {
        let key = (corner.position, corner.coordinate, corner.normal);
        if let Some(&slot) = self.slots.get(&key) {
            return Ok(slot);
        }

        let position = self.lookup(&self.positions, corner.position, "positions", line)?;
        let coordinate = match corner.coordinate {
            Some(index) => {
                self.group_has_coordinates = true;
                Some(self.lookup(&self.coordinates, index, "coordinates", line)?)
            }
            None => None,
        };
        let normal = match corner.normal {
            Some(index) => {
                self.group_has_normals = true;
                Some(self.lookup(&self.normals, index, "normals", line)?)
            }
            None => None,
        };

        let slot = self.current.positions.len() as u32;
        self.current.positions.push(position);
        self.current.coordinates.push(coordinate.unwrap_or_default());
        self.current.normals.push(normal.unwrap_or_default());
        self.slots.insert(key, slot);
        Ok(slot)
    }

    fn lookup<T: Copy>(&self, table: &[T], index: usize, pool: &'static str, line: usize) -> Result<T, ParserError> {
        if table.is_empty() {
            // Consistency check against the global table: referencing a kind
            // of data the file never defines is a file-level error.
            return Err(ParserError::FormatError {
                file: self.file.to_owned(),
                reason: format!("faces reference {} but the file defines none", pool),
            });
        }
        table.get(index).copied().ok_or_else(|| ParserError::InvalidReference {
            file: self.file.to_owned(),
            element: format!("face at line {}", line),
            pool,
            reason: format!("index {} out of range ({} entries)", index + 1, table.len()),
        })
    }

    fn close_group(&mut self) {
        let mut group = std::mem::take(&mut self.current);
        if !self.group_has_coordinates {
            group.coordinates.clear();
        }
        if !self.group_has_normals {
            group.normals.clear();
        }
        self.groups.push(group);
        self.slots.clear();
        self.group_has_coordinates = false;
        self.group_has_normals = false;
    }

    fn finish(mut self) -> Vec<ObjGroup> {
        if !self.current.triangles.is_empty() {
            self.close_group();
        }
        self.groups
    }
}
