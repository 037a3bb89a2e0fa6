use std::fs;

use tempfile::TempDir;
use unbeam_repl::repl::{Repl, ReplCommand};

// --- external term format builders ---

fn atom(name: &str) -> Vec<u8> {
    let mut bytes = vec![119, name.len() as u8];
    bytes.extend_from_slice(name.as_bytes());
    bytes
}

fn small_int(value: u8) -> Vec<u8> {
    vec![97, value]
}

fn binary(payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![109];
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

fn tuple(elements: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = vec![104, elements.len() as u8];
    for element in elements {
        bytes.extend_from_slice(element);
    }
    bytes
}

fn list(elements: &[Vec<u8>]) -> Vec<u8> {
    if elements.is_empty() {
        return vec![106];
    }
    let mut bytes = vec![108];
    bytes.extend_from_slice(&(elements.len() as u32).to_be_bytes());
    for element in elements {
        bytes.extend_from_slice(element);
    }
    bytes.push(106);
    bytes
}

fn map(pairs: &[(Vec<u8>, Vec<u8>)]) -> Vec<u8> {
    let mut bytes = vec![116];
    bytes.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
    for (key, value) in pairs {
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(value);
    }
    bytes
}

// --- container builders ---

fn chunk_bytes(name: &str, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(name.as_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(payload);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
}

fn container(chunks: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"BEAM");
    for (name, payload) in chunks {
        body.extend_from_slice(&chunk_bytes(name, payload));
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"FOR1");
    bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&body);
    bytes
}

fn atom_chunk(names: &[&str]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&(names.len() as u32).to_be_bytes());
    for name in names {
        payload.push(name.len() as u8);
        payload.extend_from_slice(name.as_bytes());
    }
    payload
}

/// `def run(x), do: x` as the `elixir_erl` debug-info envelope.
fn debug_info_chunk() -> Vec<u8> {
    let var_x = tuple(&[atom("x"), list(&[]), atom("nil")]);
    let meta = list(&[tuple(&[atom("line"), small_int(2)])]);

    let clause = tuple(&[meta.clone(), list(&[var_x.clone()]), list(&[]), var_x]);
    let definition = tuple(&[
        tuple(&[atom("run"), small_int(1)]),
        atom("def"),
        meta,
        list(&[clause]),
    ]);

    let envelope = tuple(&[
        atom("debug_info_v1"),
        atom("elixir_erl"),
        tuple(&[
            atom("elixir_v1"),
            map(&[
                (atom("module"), atom("Elixir.Sample")),
                (atom("file"), binary(b"lib/sample.ex")),
                (atom("line"), small_int(1)),
                (atom("attributes"), list(&[])),
                (atom("definitions"), list(&[definition])),
            ]),
            list(&[]),
        ]),
    ]);

    let mut bytes = vec![131];
    bytes.extend_from_slice(&envelope);
    bytes
}

/// One function, atoms 1 = module and 2 = `run`.
fn code_chunk() -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&16u32.to_be_bytes()); // info size
    payload.extend_from_slice(&0u32.to_be_bytes()); // version
    payload.extend_from_slice(&169u32.to_be_bytes()); // max opcode
    payload.extend_from_slice(&3u32.to_be_bytes()); // label count
    payload.extend_from_slice(&1u32.to_be_bytes()); // function count

    payload.extend_from_slice(&[
        1, 0x10, // label u(1)
        2, 0x12, 0x22, 0x10, // func_info a(1) a(2) u(1)
        1, 0x20, // label u(2)
        19, // return
        3,  // int_code_end
    ]);
    payload
}

fn write_fixture(dir: &TempDir) -> String {
    let bytes = container(&[
        ("AtU8", atom_chunk(&["Elixir.Sample", "run"])),
        ("Code", code_chunk()),
        ("Dbgi", debug_info_chunk()),
    ]);

    let path = dir.path().join("Elixir.Sample.beam");
    fs::write(&path, bytes).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn load_reports_module_and_definition_count() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir);

    let mut repl = Repl::new();
    let output = repl.handle_command(ReplCommand::Load(path)).unwrap();
    assert!(output.contains("Elixir.Sample"));
    assert!(output.contains("1 definitions"));
}

#[test]
fn decompile_produces_module_source() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir);

    let mut repl = Repl::new();
    repl.load(&path).unwrap();

    let output = repl.handle_command(ReplCommand::Decompile(None)).unwrap();
    assert_eq!(
        output,
        "defmodule Sample do\n  def run(x) do\n    x\n  end\nend\n"
    );
}

#[test]
fn decompile_selects_by_name_and_arity() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir);

    let mut repl = Repl::new();
    repl.load(&path).unwrap();

    let output = repl.decompile(Some("run/1")).unwrap();
    assert!(output.contains("def run(x) do"));

    assert!(repl.decompile(Some("missing/3")).is_err());
    assert!(repl.decompile(Some("run/9")).is_err());
}

#[test]
fn chunks_command_lists_inventory_in_file_order() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir);

    let mut repl = Repl::new();
    repl.load(&path).unwrap();

    let output = repl.handle_command(ReplCommand::Chunks).unwrap();
    let atu8 = output.find("AtU8").unwrap();
    let code = output.find("Code").unwrap();
    let dbgi = output.find("Dbgi").unwrap();
    assert!(atu8 < code && code < dbgi);
}

#[test]
fn asm_renders_whole_chunk_and_single_function() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir);

    let mut repl = Repl::new();
    repl.load(&path).unwrap();

    let whole = repl.handle_command(ReplCommand::Asm(None)).unwrap();
    assert!(whole.contains("func_info"));
    assert!(whole.contains("return"));

    let single = repl.asm(Some("run/1")).unwrap();
    assert!(single.contains("func_info"));
    assert!(repl.asm(Some("missing/1")).is_err());
    assert!(repl.asm(Some("run")).is_err());
}

#[test]
fn info_serializes_to_json() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir);

    let mut repl = Repl::new();
    repl.load(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&repl.info_json().unwrap()).unwrap();
    assert_eq!(json["module"], "Elixir.Sample");
    assert_eq!(json["source_file"], "lib/sample.ex");
    assert_eq!(json["definitions"][0], "def run/1");
}

#[test]
fn load_without_debug_info_still_serves_chunks() {
    let dir = TempDir::new().unwrap();
    let bytes = container(&[
        ("AtU8", atom_chunk(&["Elixir.Bare"])),
        ("Code", code_chunk()),
    ]);
    let path = dir.path().join("Elixir.Bare.beam");
    fs::write(&path, bytes).unwrap();

    let mut repl = Repl::new();
    repl.load(&path.to_string_lossy()).unwrap();

    assert!(repl.handle_command(ReplCommand::Chunks).is_ok());
    assert!(repl.decompile(None).is_err());
}
