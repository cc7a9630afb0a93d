//! Benchmarks for class file parsing and entry probe injection.
//!
//! - Parsing and re-serializing an untouched class file
//! - Rewriting a class with many small methods
//! - Rewriting a class with one large method carrying debug tables

extern crate keepscope;

use criterion::{criterion_group, criterion_main, Criterion};
use keepscope::{
    classfile::{
        code::{CodeAttribute, LINE_NUMBER_TABLE},
        flags::{ClassAccessFlags, MethodAccessFlags},
        member::Attribute,
        ClassFile,
    },
    instrument::{EntryProbeRewriter, Rewriter},
};
use std::hint::black_box;

/// A class with `methods` trivial public methods.
fn many_methods(methods: usize) -> Vec<u8> {
    let mut class = ClassFile::new(
        "com/example/Service",
        "java/lang/Object",
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
    )
    .unwrap();
    for i in 0..methods {
        class
            .add_method(
                MethodAccessFlags::PUBLIC,
                &format!("op{i}"),
                "(ILjava/lang/String;)V",
                Some(CodeAttribute::new(0, 3, vec![0xB1])),
            )
            .unwrap();
    }
    class.to_bytes().unwrap()
}

/// A class with one 16 KiB method and a line number entry every 4 bytes.
fn large_method() -> Vec<u8> {
    let mut class = ClassFile::new(
        "com/example/Generated",
        "java/lang/Object",
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
    )
    .unwrap();
    let line_table = class.constant_pool.add_utf8(LINE_NUMBER_TABLE).unwrap();

    let mut code = vec![0x00; 16 * 1024 - 1];
    code.push(0xB1);
    let entries = (code.len() / 4) as u16;
    let mut info = entries.to_be_bytes().to_vec();
    for i in 0..entries {
        info.extend_from_slice(&(i * 4).to_be_bytes());
        info.extend_from_slice(&(i + 1).to_be_bytes());
    }

    let mut body = CodeAttribute::new(0, 1, code);
    body.attributes.push(Attribute {
        name_index: line_table,
        info,
    });
    class
        .add_method(MethodAccessFlags::STATIC, "init", "()V", Some(body))
        .unwrap();
    class.to_bytes().unwrap()
}

fn bench_parse_serialize(c: &mut Criterion) {
    let bytes = many_methods(200);

    c.bench_function("classfile_parse_serialize_200_methods", |b| {
        b.iter(|| {
            let class = ClassFile::parse(black_box(&bytes)).unwrap();
            black_box(class.to_bytes().unwrap())
        });
    });
}

fn bench_rewrite_many_methods(c: &mut Criterion) {
    let bytes = many_methods(200);
    let rewriter = EntryProbeRewriter::default();

    c.bench_function("rewrite_200_methods", |b| {
        b.iter(|| black_box(rewriter.rewrite(black_box(&bytes)).unwrap()));
    });
}

fn bench_rewrite_large_method(c: &mut Criterion) {
    let bytes = large_method();
    let rewriter = EntryProbeRewriter::default();

    c.bench_function("rewrite_16k_method_with_lines", |b| {
        b.iter(|| black_box(rewriter.rewrite(black_box(&bytes)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_parse_serialize,
    bench_rewrite_many_methods,
    bench_rewrite_large_method
);
criterion_main!(benches);
