//! Persisted binary cache format (spec §6.3).
//!
//! Grounded loosely in `original_source/engine/include/pnkr/core/cache.hpp`'s
//! chunked-binary convention; this port concretizes the chunk fourccs the
//! spec leaves generic as `MATL`/`MESH`/`BNDS`/`TXTR` (`[SUPPLEMENT]`, see
//! `SPEC_FULL.md` §6.3).

use std::io::{self, Read, Write};

use crate::assets::database::AssetDatabase;
use crate::assets::material::MaterialData;
use crate::assets::mesh::{Aabb, Mesh, Primitive};
use crate::errors::{EngineError, Result};

const MAGIC: u32 = u32::from_le_bytes(*b"PNKR");
const VERSION: u16 = 1;
const ENDIAN_MARKER: u16 = 1;

const FOURCC_MATL: u32 = u32::from_le_bytes(*b"MATL");
const FOURCC_MESH: u32 = u32::from_le_bytes(*b"MESH");
const FOURCC_BNDS: u32 = u32::from_le_bytes(*b"BNDS");
const FOURCC_TXTR: u32 = u32::from_le_bytes(*b"TXTR");

fn write_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}
fn write_u16(w: &mut impl Write, v: u16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}
fn write_u64(w: &mut impl Write, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}
fn read_u16(r: &mut impl Read) -> io::Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    Ok(u16::from_le_bytes(b))
}
fn read_u64(r: &mut impl Read) -> io::Result<u64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}

fn write_string_list(w: &mut impl Write, items: &[String]) -> io::Result<()> {
    write_u64(w, items.len() as u64)?;
    for s in items {
        let bytes = s.as_bytes();
        write_u64(w, bytes.len() as u64)?;
        w.write_all(bytes)?;
    }
    Ok(())
}

fn read_string_list(r: &mut impl Read) -> io::Result<Vec<String>> {
    let count = read_u64(r)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = read_u64(r)? as usize;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        out.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(out)
}

struct Chunk {
    fourcc: u32,
    version: u16,
    flags: u16,
    payload: Vec<u8>,
}

fn write_chunk(w: &mut impl Write, chunk: &Chunk) -> io::Result<()> {
    write_u32(w, chunk.fourcc)?;
    write_u16(w, chunk.version)?;
    write_u16(w, chunk.flags)?;
    write_u64(w, chunk.payload.len() as u64)?;
    w.write_all(&chunk.payload)
}

fn read_chunk(r: &mut impl Read) -> io::Result<Chunk> {
    let fourcc = read_u32(r)?;
    let version = read_u16(r)?;
    let flags = read_u16(r)?;
    let size = read_u64(r)? as usize;
    let mut payload = vec![0u8; size];
    r.read_exact(&mut payload)?;
    Ok(Chunk { fourcc, version, flags, payload })
}

/// Serializes the persistable subset of `db` (materials, meshes, bounds,
/// texture paths/srgb flags) to `w` in the cache's chunked binary format.
pub fn save(db: &AssetDatabase, w: &mut impl Write) -> Result<()> {
    let chunks = build_chunks(db);

    write_u32(w, MAGIC).map_err(io_err("<cache>"))?;
    write_u16(w, VERSION).map_err(io_err("<cache>"))?;
    write_u16(w, ENDIAN_MARKER).map_err(io_err("<cache>"))?;
    write_u32(w, chunks.len() as u32).map_err(io_err("<cache>"))?;
    for chunk in &chunks {
        write_chunk(w, chunk).map_err(io_err("<cache>"))?;
    }
    Ok(())
}

fn build_chunks(db: &AssetDatabase) -> Vec<Chunk> {
    let mut materials_payload = Vec::new();
    write_u64(&mut materials_payload, db.materials.len() as u64).unwrap();
    materials_payload.extend_from_slice(bytemuck::cast_slice(&db.materials));

    let mut mesh_payload = Vec::new();
    write_u64(&mut mesh_payload, db.meshes.len() as u64).unwrap();
    for mesh in &db.meshes {
        let name_bytes = mesh.name.as_bytes();
        write_u64(&mut mesh_payload, name_bytes.len() as u64).unwrap();
        mesh_payload.extend_from_slice(name_bytes);
        write_u64(&mut mesh_payload, mesh.primitives.len() as u64).unwrap();
        for p in &mesh.primitives {
            write_u32(&mut mesh_payload, p.first_index).unwrap();
            write_u32(&mut mesh_payload, p.index_count).unwrap();
            write_u32(&mut mesh_payload, p.vertex_offset as u32).unwrap();
            write_u32(&mut mesh_payload, p.material_index).unwrap();
        }
    }

    let mut bounds_payload = Vec::new();
    write_u64(&mut bounds_payload, db.mesh_bounds.len() as u64).unwrap();
    bounds_payload.extend_from_slice(bytemuck::cast_slice(&db.mesh_bounds));

    let mut textures_payload = Vec::new();
    write_string_list(&mut textures_payload, &db.texture_files).unwrap();
    write_u64(&mut textures_payload, db.texture_is_srgb.len() as u64).unwrap();
    for &srgb in &db.texture_is_srgb {
        textures_payload.push(u8::from(srgb));
    }

    vec![
        Chunk { fourcc: FOURCC_MATL, version: 1, flags: 0, payload: materials_payload },
        Chunk { fourcc: FOURCC_MESH, version: 1, flags: 0, payload: mesh_payload },
        Chunk { fourcc: FOURCC_BNDS, version: 1, flags: 0, payload: bounds_payload },
        Chunk { fourcc: FOURCC_TXTR, version: 1, flags: 0, payload: textures_payload },
    ]
}

/// Deserializes a cache file written by [`save`]. On any corruption (bad
/// magic/version/short chunk), returns `CacheCorrupt` — the caller's
/// responsibility per spec §6.3/§7 is to delete the file and re-import from
/// source.
pub fn load(r: &mut impl Read) -> Result<AssetDatabase> {
    let magic = read_u32(r).map_err(io_err("<cache>"))?;
    if magic != MAGIC {
        return Err(EngineError::CacheCorrupt { reason: "bad magic".to_string() });
    }
    let version = read_u16(r).map_err(io_err("<cache>"))?;
    if version != VERSION {
        return Err(EngineError::CacheCorrupt { reason: format!("unsupported version {version}") });
    }
    let _endian = read_u16(r).map_err(io_err("<cache>"))?;
    let chunk_count = read_u32(r).map_err(io_err("<cache>"))?;

    let mut db = AssetDatabase::new();

    for _ in 0..chunk_count {
        let chunk = read_chunk(r).map_err(|e| EngineError::CacheCorrupt { reason: e.to_string() })?;
        let mut cursor = io::Cursor::new(chunk.payload);
        match chunk.fourcc {
            FOURCC_MATL => {
                let count = read_u64(&mut cursor).map_err(corrupt)? as usize;
                let remaining = &cursor.get_ref()[cursor.position() as usize..];
                let materials: &[MaterialData] = bytemuck::try_cast_slice(remaining)
                    .map_err(|_| EngineError::CacheCorrupt { reason: "malformed MATL chunk".to_string() })?;
                if materials.len() != count {
                    return Err(EngineError::CacheCorrupt { reason: "MATL count mismatch".to_string() });
                }
                db.materials = materials.to_vec();
            }
            FOURCC_MESH => {
                let count = read_u64(&mut cursor).map_err(corrupt)?;
                for _ in 0..count {
                    let name_len = read_u64(&mut cursor).map_err(corrupt)? as usize;
                    let mut name_bytes = vec![0u8; name_len];
                    cursor.read_exact(&mut name_bytes).map_err(corrupt)?;
                    let name = String::from_utf8_lossy(&name_bytes).into_owned();
                    let prim_count = read_u64(&mut cursor).map_err(corrupt)?;
                    let mut primitives = Vec::with_capacity(prim_count as usize);
                    for _ in 0..prim_count {
                        let first_index = read_u32(&mut cursor).map_err(corrupt)?;
                        let index_count = read_u32(&mut cursor).map_err(corrupt)?;
                        let vertex_offset = read_u32(&mut cursor).map_err(corrupt)? as i32;
                        let material_index = read_u32(&mut cursor).map_err(corrupt)?;
                        primitives.push(Primitive { first_index, index_count, vertex_offset, material_index });
                    }
                    db.meshes.push(Mesh { name, primitives });
                }
            }
            FOURCC_BNDS => {
                let count = read_u64(&mut cursor).map_err(corrupt)? as usize;
                let remaining = &cursor.get_ref()[cursor.position() as usize..];
                let bounds: &[Aabb] = bytemuck::try_cast_slice(remaining)
                    .map_err(|_| EngineError::CacheCorrupt { reason: "malformed BNDS chunk".to_string() })?;
                if bounds.len() != count {
                    return Err(EngineError::CacheCorrupt { reason: "BNDS count mismatch".to_string() });
                }
                db.mesh_bounds = bounds.to_vec();
            }
            FOURCC_TXTR => {
                let files = read_string_list(&mut cursor).map_err(corrupt)?;
                let srgb_count = read_u64(&mut cursor).map_err(corrupt)? as usize;
                let mut srgb = Vec::with_capacity(srgb_count);
                for _ in 0..srgb_count {
                    let mut b = [0u8; 1];
                    cursor.read_exact(&mut b).map_err(corrupt)?;
                    srgb.push(b[0] != 0);
                }
                db.texture_files = files;
                db.texture_is_srgb = srgb;
            }
            _ => {
                // Unknown chunk: forward-compatible readers skip it.
                log::debug!("cache: skipping unknown chunk fourcc {:#x}", chunk.fourcc);
            }
        }
    }

    Ok(db)
}

fn corrupt(e: io::Error) -> EngineError {
    EngineError::CacheCorrupt { reason: e.to_string() }
}

fn io_err(path: &str) -> impl Fn(io::Error) -> EngineError + '_ {
    move |source| EngineError::Io { path: path.to_string(), source }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> AssetDatabase {
        let mut db = AssetDatabase::new();
        db.materials.push(MaterialData::default());
        db.append_primitive_mesh_data(
            &[crate::assets::vertex::Vertex::default(), crate::assets::vertex::Vertex::default()],
            &[0, 1],
            0,
            "cube",
        );
        db.texture_files.push("textures/albedo.ktx2".to_string());
        db.texture_is_srgb.push(true);
        db
    }

    #[test]
    fn round_trips_materials_meshes_bounds_and_textures() {
        let db = sample_db();
        let mut bytes = Vec::new();
        save(&db, &mut bytes).unwrap();

        let loaded = load(&mut io::Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.materials.len(), db.materials.len());
        assert_eq!(loaded.meshes.len(), db.meshes.len());
        assert_eq!(loaded.meshes[0].name, "cube");
        assert_eq!(loaded.mesh_bounds.len(), db.mesh_bounds.len());
        assert_eq!(loaded.texture_files, db.texture_files);
        assert_eq!(loaded.texture_is_srgb, db.texture_is_srgb);
    }

    #[test]
    fn bad_magic_is_cache_corrupt() {
        let bytes = vec![0u8; 16];
        let err = load(&mut io::Cursor::new(bytes));
        assert!(matches!(err, Err(EngineError::CacheCorrupt { .. })));
    }

    #[test]
    fn truncated_chunk_is_cache_corrupt() {
        let db = sample_db();
        let mut bytes = Vec::new();
        save(&db, &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 4);
        let err = load(&mut io::Cursor::new(bytes));
        assert!(matches!(err, Err(EngineError::CacheCorrupt { .. })));
    }

    #[test]
    fn version_mismatch_is_cache_corrupt() {
        let db = sample_db();
        let mut bytes = Vec::new();
        save(&db, &mut bytes).unwrap();
        bytes[4] = 0xFF;
        bytes[5] = 0xFF;
        let err = load(&mut io::Cursor::new(bytes));
        assert!(matches!(err, Err(EngineError::CacheCorrupt { .. })));
    }
}
