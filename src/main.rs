use clap::Parser;
use glam::{Mat4, Vec3};

use meshgate::io::source::FileSource;
use meshgate::loader::document_loader::DocumentLoader;
use meshgate::loader::gltf_loader::GltfLoader;
use meshgate::loader::obj_loader::ObjLoader;
use meshgate::loader::tds_loader::TdsLoader;
use meshgate::loader::LoadOptions;
use meshgate::model::flatten::ModelFlattener;
use meshgate::model::types::{Mesh, Model};

#[derive(Parser, Debug)]
#[command(name = "meshgate")]
#[command(version)]
#[command(about = "A 3D model ingestion pipeline")]
struct CliArgs {
    /// Model file (.3ds, .gltf/.glb, .obj or .json), relative to the root.
    file: String,

    #[arg(long, env = "MESHGATE_ROOT", default_value = ".")]
    root: String,

    /// Only apply geometry from the named object (text format only).
    #[arg(long)]
    object: Option<String>,

    /// Merge the whole tree into one polygon per material before printing.
    #[arg(long)]
    flatten: bool,

    /// Uniform scale applied to the root nodes.
    #[arg(long)]
    scale: Option<f32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);

    let source = FileSource::new(args.root.as_str());
    let options = LoadOptions {
        transform: args.scale.map(|scale| Mat4::from_scale(Vec3::splat(scale))),
        object_filter: args.object.clone(),
    };

    let model = match extension(&args.file).as_str() {
        "3ds" => TdsLoader::load(&source, &args.file, &options).await?,
        "gltf" | "glb" => GltfLoader::load(&source, &args.file, &options).await?,
        "obj" => ObjLoader::load(&source, &args.file, &options).await?,
        "json" => DocumentLoader::load(&source, &args.file, &options).await?,
        other => anyhow::bail!("unsupported model extension '{}'", other),
    };

    let model = if args.flatten {
        ModelFlattener::flatten(&model)?
    } else {
        model
    };

    print_model(&model);
    Ok(())
}

fn extension(file: &str) -> String {
    file.rsplit('.').next().unwrap_or("").to_ascii_lowercase()
}

fn print_model(model: &Model) {
    println!("{} root mesh(es)", model.meshes.len());
    for mesh in &model.meshes {
        print_mesh(mesh, 1);
    }
}

fn print_mesh(mesh: &Mesh, depth: usize) {
    let indent = "  ".repeat(depth);
    let name = if mesh.name.is_empty() { "(unnamed)" } else { &mesh.name };
    println!("{}{}", indent, name);

    for polygon in &mesh.polygons {
        let material = polygon
            .material
            .as_deref()
            .and_then(|material| material.name.as_deref())
            .unwrap_or("(none)");
        println!(
            "{}  {} vertices, {} triangles, normals: {}, tangents: {}, uvs: {}, material: {}",
            indent,
            polygon.positions.len(),
            polygon.indices.len(),
            !polygon.normals.is_empty(),
            !polygon.tangents.is_empty(),
            !polygon.coordinates.is_empty(),
            material
        );
    }
    for child in &mesh.children {
        print_mesh(child, depth + 1);
    }
}
