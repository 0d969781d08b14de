//! End-to-end runs over jars assembled in a temp dir.

use std::fs;
use std::io::Write;
use std::path::Path;

use seam_bridge::{fix_bridges, BridgeError, FixBridgesConfig};
use seam_classfile::{ACC_ABSTRACT, ACC_BRIDGE, ACC_INTERFACE, ACC_PUBLIC, ACC_SYNTHETIC};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Constant-pool builder; duplicate entries are fine for the parser.
#[derive(Default)]
struct Pool {
    data: Vec<u8>,
    count: u16,
}

impl Pool {
    fn raw(&mut self, entry: &[u8]) -> u16 {
        self.data.extend_from_slice(entry);
        self.count += 1;
        self.count
    }

    fn utf8(&mut self, value: &str) -> u16 {
        let mut entry = vec![1u8];
        entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
        entry.extend_from_slice(value.as_bytes());
        self.raw(&entry)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name_idx = self.utf8(name);
        let mut entry = vec![7u8];
        entry.extend_from_slice(&name_idx.to_be_bytes());
        self.raw(&entry)
    }

    fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_idx = self.class(owner);
        let name_idx = self.utf8(name);
        let desc_idx = self.utf8(descriptor);
        let mut nat = vec![12u8];
        nat.extend_from_slice(&name_idx.to_be_bytes());
        nat.extend_from_slice(&desc_idx.to_be_bytes());
        let nat_idx = self.raw(&nat);

        let mut entry = vec![10u8];
        entry.extend_from_slice(&class_idx.to_be_bytes());
        entry.extend_from_slice(&nat_idx.to_be_bytes());
        self.raw(&entry)
    }
}

struct MethodSpec {
    access: u16,
    name: &'static str,
    descriptor: &'static str,
    /// `(max_stack, max_locals, bytecode)`; `None` makes it abstract.
    code: Option<(u16, u16, Vec<u8>)>,
}

fn assemble(
    pool: &mut Pool,
    access: u16,
    this_class: &str,
    super_class: &str,
    interfaces: &[&str],
    methods: &[MethodSpec],
) -> Vec<u8> {
    let this_idx = pool.class(this_class);
    let super_idx = pool.class(super_class);
    let interface_idx: Vec<u16> = interfaces.iter().map(|name| pool.class(name)).collect();
    let code_attr = pool.utf8("Code");
    let method_idx: Vec<(u16, u16)> = methods
        .iter()
        .map(|m| (pool.utf8(m.name), pool.utf8(m.descriptor)))
        .collect();

    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 52]); // minor 0, major 52
    out.extend_from_slice(&(pool.count + 1).to_be_bytes());
    out.extend_from_slice(&pool.data);
    out.extend_from_slice(&access.to_be_bytes());
    out.extend_from_slice(&this_idx.to_be_bytes());
    out.extend_from_slice(&super_idx.to_be_bytes());
    out.extend_from_slice(&(interface_idx.len() as u16).to_be_bytes());
    for idx in &interface_idx {
        out.extend_from_slice(&idx.to_be_bytes());
    }
    out.extend_from_slice(&0u16.to_be_bytes()); // fields

    out.extend_from_slice(&(methods.len() as u16).to_be_bytes());
    for (method, (name_idx, desc_idx)) in methods.iter().zip(&method_idx) {
        out.extend_from_slice(&method.access.to_be_bytes());
        out.extend_from_slice(&name_idx.to_be_bytes());
        out.extend_from_slice(&desc_idx.to_be_bytes());
        match &method.code {
            None => out.extend_from_slice(&0u16.to_be_bytes()),
            Some((max_stack, max_locals, bytecode)) => {
                out.extend_from_slice(&1u16.to_be_bytes());
                out.extend_from_slice(&code_attr.to_be_bytes());
                let length = 2 + 2 + 4 + bytecode.len() + 2 + 2;
                out.extend_from_slice(&(length as u32).to_be_bytes());
                out.extend_from_slice(&max_stack.to_be_bytes());
                out.extend_from_slice(&max_locals.to_be_bytes());
                out.extend_from_slice(&(bytecode.len() as u32).to_be_bytes());
                out.extend_from_slice(bytecode);
                out.extend_from_slice(&0u16.to_be_bytes()); // exception table
                out.extend_from_slice(&0u16.to_be_bytes()); // attributes
            }
        }
    }

    out.extend_from_slice(&0u16.to_be_bytes()); // class attributes
    out
}

fn invoke_virtual(index: u16) -> Vec<u8> {
    // aload_0; invokevirtual #index; areturn
    let mut code = vec![0x2a, 0xb6];
    code.extend_from_slice(&index.to_be_bytes());
    code.push(0xb0);
    code
}

fn null_return() -> Vec<u8> {
    vec![0x01, 0xb0] // aconst_null; areturn
}

fn write_jar(path: &Path, classes: &[(&str, Vec<u8>)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, bytes) in classes {
        zip.start_file(format!("{name}.class"), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

fn base_class() -> Vec<u8> {
    let mut pool = Pool::default();
    assemble(
        &mut pool,
        ACC_PUBLIC,
        "A",
        "java/lang/Object",
        &[],
        &[MethodSpec {
            access: ACC_PUBLIC,
            name: "get",
            descriptor: "()Ljava/lang/Object;",
            code: Some((1, 1, null_return())),
        }],
    )
}

fn bridged_subclass() -> Vec<u8> {
    let mut pool = Pool::default();
    let target_ref = pool.method_ref("B", "get", "()Ljava/lang/String;");
    assemble(
        &mut pool,
        ACC_PUBLIC,
        "B",
        "A",
        &[],
        &[
            MethodSpec {
                access: ACC_PUBLIC | ACC_BRIDGE | ACC_SYNTHETIC,
                name: "get",
                descriptor: "()Ljava/lang/Object;",
                code: Some((1, 1, invoke_virtual(target_ref))),
            },
            MethodSpec {
                access: ACC_PUBLIC,
                name: "get",
                descriptor: "()Ljava/lang/String;",
                code: Some((1, 1, null_return())),
            },
        ],
    )
}

fn config(dir: &Path, out_name: &str) -> FixBridgesConfig {
    FixBridgesConfig {
        library: dir.join("input.jar"),
        mappings_in: dir.join("mappings.tiny"),
        mappings_out: dir.join(out_name),
        library_namespace: "official".to_string(),
        corrective_namespaces: vec!["named".to_string()],
        filter_prefix: None,
        classpath: Vec::new(),
    }
}

const MAPPINGS: &str = "v1\tofficial\tintermediary\tnamed\n\
    CLASS\tA\tclass_1\tBoxA\n\
    CLASS\tB\tclass_2\tBoxB\n\
    METHOD\tA\t()Ljava/lang/Object;\tget\tmethod_1\tgetValue\n\
    METHOD\tB\t()Ljava/lang/Object;\tget\tmethod_2\tgetValue\n\
    METHOD\tB\t()Ljava/lang/String;\tget\tmethod_3\tgetReal\n";

#[test]
fn finds_and_rewrites_a_covariant_bridge() {
    let dir = tempfile::tempdir().unwrap();
    write_jar(
        &dir.path().join("input.jar"),
        &[("A", base_class()), ("B", bridged_subclass())],
    );
    fs::write(dir.path().join("mappings.tiny"), MAPPINGS).unwrap();

    let outcome = fix_bridges(&config(dir.path(), "out.tiny")).unwrap();
    assert_eq!(outcome.bridges_found, 1);
    assert_eq!(outcome.resolved_targets, 1);
    assert_eq!(outcome.unresolved_targets, 0);
    assert_eq!(outcome.direct_references, 0);
    assert_eq!(outcome.lines_rewritten, 1);
    assert!(!outcome.copied_verbatim);

    let output = fs::read_to_string(dir.path().join("out.tiny")).unwrap();
    // The bridge's own line is found by name+descriptor; its first match
    // (A's declaration) supplies the corrective name.
    assert!(output.contains("METHOD\tB\t()Ljava/lang/String;\tget\tmethod_3\tgetValue\n"));
    // Untouched lines survive byte-for-byte, in order.
    assert!(output.contains("CLASS\tA\tclass_1\tBoxA\n"));
    assert!(output.contains("METHOD\tB\t()Ljava/lang/Object;\tget\tmethod_2\tgetValue\n"));
    assert_eq!(output.lines().count(), MAPPINGS.lines().count());
}

#[test]
fn rerunning_on_its_own_output_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_jar(
        &dir.path().join("input.jar"),
        &[("A", base_class()), ("B", bridged_subclass())],
    );
    fs::write(dir.path().join("mappings.tiny"), MAPPINGS).unwrap();

    fix_bridges(&config(dir.path(), "out.tiny")).unwrap();
    let first = fs::read_to_string(dir.path().join("out.tiny")).unwrap();

    let mut again = config(dir.path(), "out2.tiny");
    again.mappings_in = dir.path().join("out.tiny");
    fix_bridges(&again).unwrap();
    let second = fs::read_to_string(dir.path().join("out2.tiny")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn zero_bridges_copies_the_file_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    write_jar(&dir.path().join("input.jar"), &[("A", base_class())]);
    fs::write(dir.path().join("mappings.tiny"), MAPPINGS).unwrap();

    let outcome = fix_bridges(&config(dir.path(), "out.tiny")).unwrap();
    assert_eq!(outcome.bridges_found, 0);
    assert!(outcome.copied_verbatim);
    assert_eq!(
        fs::read(dir.path().join("out.tiny")).unwrap(),
        MAPPINGS.as_bytes()
    );
}

#[test]
fn missing_required_namespace_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_jar(&dir.path().join("input.jar"), &[("A", base_class())]);
    fs::write(dir.path().join("mappings.tiny"), MAPPINGS).unwrap();

    let mut bad = config(dir.path(), "out.tiny");
    bad.library_namespace = "missing".to_string();
    let err = fix_bridges(&bad).unwrap_err();
    assert!(matches!(err, BridgeError::Mapping(_)));
    assert!(!dir.path().join("out.tiny").exists());
}

#[test]
fn existing_output_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    write_jar(
        &dir.path().join("input.jar"),
        &[("A", base_class()), ("B", bridged_subclass())],
    );
    fs::write(dir.path().join("mappings.tiny"), MAPPINGS).unwrap();
    fs::write(dir.path().join("out.tiny"), "occupied").unwrap();

    let err = fix_bridges(&config(dir.path(), "out.tiny")).unwrap_err();
    assert!(matches!(err, BridgeError::OutputExists(_)));
}

#[test]
fn doubly_narrowed_target_keeps_the_widest_bridge() {
    let dir = tempfile::tempdir().unwrap();

    let i1 = {
        let mut pool = Pool::default();
        assemble(
            &mut pool,
            ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
            "I1",
            "java/lang/Object",
            &[],
            &[MethodSpec {
                access: ACC_PUBLIC | ACC_ABSTRACT,
                name: "m",
                descriptor: "()Ljava/lang/CharSequence;",
                code: None,
            }],
        )
    };
    let i2 = {
        let mut pool = Pool::default();
        assemble(
            &mut pool,
            ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
            "I2",
            "java/lang/Object",
            &[],
            &[MethodSpec {
                access: ACC_PUBLIC | ACC_ABSTRACT,
                name: "m",
                descriptor: "()Ljava/lang/Object;",
                code: None,
            }],
        )
    };
    let c = {
        let mut pool = Pool::default();
        let target_ref = pool.method_ref("C", "m", "()Ljava/lang/String;");
        assemble(
            &mut pool,
            ACC_PUBLIC,
            "C",
            "java/lang/Object",
            &["I1", "I2"],
            &[
                MethodSpec {
                    access: ACC_PUBLIC,
                    name: "m",
                    descriptor: "()Ljava/lang/String;",
                    code: Some((1, 1, null_return())),
                },
                MethodSpec {
                    access: ACC_PUBLIC | ACC_BRIDGE | ACC_SYNTHETIC,
                    name: "m",
                    descriptor: "()Ljava/lang/CharSequence;",
                    code: Some((1, 1, invoke_virtual(target_ref))),
                },
                MethodSpec {
                    access: ACC_PUBLIC | ACC_BRIDGE | ACC_SYNTHETIC,
                    name: "m",
                    descriptor: "()Ljava/lang/Object;",
                    code: Some((1, 1, invoke_virtual(target_ref))),
                },
            ],
        )
    };
    write_jar(
        &dir.path().join("input.jar"),
        &[("I1", i1), ("I2", i2), ("C", c)],
    );

    let mappings = "v1\tofficial\tnamed\n\
        METHOD\tC\t()Ljava/lang/String;\tm\tmReal\n\
        METHOD\tC\t()Ljava/lang/CharSequence;\tm\tmSeq\n\
        METHOD\tC\t()Ljava/lang/Object;\tm\tmRoot\n";
    fs::write(dir.path().join("mappings.tiny"), mappings).unwrap();

    let mut cfg = config(dir.path(), "out.tiny");
    cfg.corrective_namespaces = vec!["named".to_string()];
    let outcome = fix_bridges(&cfg).unwrap();
    assert_eq!(outcome.bridges_found, 2);
    assert_eq!(outcome.resolved_targets, 1);
    assert_eq!(outcome.unresolved_targets, 0);

    // The Object-typed bridge wins, so the rewritten target carries the
    // Object bridge's corrective name while the losing bridge's line is
    // left alone.
    let output = fs::read_to_string(dir.path().join("out.tiny")).unwrap();
    assert!(output.contains("METHOD\tC\t()Ljava/lang/String;\tm\tmRoot\n"));
    assert!(output.contains("METHOD\tC\t()Ljava/lang/CharSequence;\tm\tmSeq\n"));
}

#[test]
fn direct_bridge_callers_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let caller = {
        let mut pool = Pool::default();
        let bridge_ref = pool.method_ref("B", "get", "()Ljava/lang/Object;");
        assemble(
            &mut pool,
            ACC_PUBLIC,
            "Caller",
            "java/lang/Object",
            &[],
            &[MethodSpec {
                access: ACC_PUBLIC,
                name: "use",
                descriptor: "(LB;)Ljava/lang/Object;",
                code: Some((1, 2, {
                    // aload_1; invokevirtual B.get()Ljava/lang/Object;; areturn
                    let mut code = vec![0x2b, 0xb6];
                    code.extend_from_slice(&bridge_ref.to_be_bytes());
                    code.push(0xb0);
                    code
                })),
            }],
        )
    };
    write_jar(
        &dir.path().join("input.jar"),
        &[("A", base_class()), ("B", bridged_subclass()), ("Caller", caller)],
    );
    fs::write(dir.path().join("mappings.tiny"), MAPPINGS).unwrap();

    let outcome = fix_bridges(&config(dir.path(), "out.tiny")).unwrap();
    assert_eq!(outcome.bridges_found, 1);
    assert_eq!(outcome.direct_references, 1);
    // Reported, not auto-excluded: the rewrite still happened.
    assert_eq!(outcome.lines_rewritten, 1);
}
