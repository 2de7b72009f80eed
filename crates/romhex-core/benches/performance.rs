use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use romhex_core::{Command, Direction, EditCommand, Editor, MemoryModel, ModelDelta, Model, ViewCommand};

const ROM_SIZE: usize = 0x80_0000;

fn rom_with_pointers(pointer_count: usize) -> MemoryModel {
    let mut model = MemoryModel::new(vec![0xFF; ROM_SIZE]);
    let mut delta = ModelDelta::new();
    // a pointer every 0x40 bytes, all aimed at the second half of the image
    for i in 0..pointer_count {
        let source = i * 0x40;
        let destination = ROM_SIZE / 2 + i * 0x10;
        model.write_pointer(&mut delta, source, Some(destination));
    }
    model
}

fn bench_open(c: &mut Criterion) {
    c.bench_function("open/8mb_4k_pointers", |b| {
        b.iter_batched(
            || rom_with_pointers(4_096),
            |model| {
                let editor = Editor::new("bench.gba", model);
                black_box(editor.cells().width());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_scroll(c: &mut Criterion) {
    let mut editor = Editor::new("bench.gba", rom_with_pointers(4_096));
    editor.set_height(48);

    c.bench_function("scroll/page_down_64", |b| {
        b.iter(|| {
            editor.set_scroll_value(0);
            for _ in 0..64 {
                editor
                    .execute(Command::View(ViewCommand::Scroll(Direction::PageDown)))
                    .unwrap();
            }
            black_box(editor.scroll_value());
        })
    });
}

fn bench_typing(c: &mut Criterion) {
    c.bench_function("typing/256_hex_bytes", |b| {
        b.iter_batched(
            || Editor::new("bench.gba", MemoryModel::new(vec![0xFF; 0x10000])),
            |mut editor| {
                editor
                    .execute(Command::Edit(EditCommand::Type {
                        text: "C0".repeat(256),
                    }))
                    .unwrap();
                black_box(editor.model().byte(0xFF));
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_undo(c: &mut Criterion) {
    c.bench_function("undo/64_pointer_steps", |b| {
        b.iter_batched(
            || {
                let mut editor = Editor::new("bench.gba", MemoryModel::new(vec![0xFF; 0x10000]));
                for i in 0..64 {
                    editor.goto(&format!("{:X}", i * 8)).unwrap();
                    editor.edit_str(&format!("<{:X}>", 0x8000 + i * 0x20));
                }
                editor
            },
            |mut editor| {
                while editor.undo() {}
                black_box(editor.can_redo());
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_open, bench_scroll, bench_typing, bench_undo);
criterion_main!(benches);
