use criterion::{Criterion, black_box, criterion_group, criterion_main};

use redlilium_gpu_memory::{
    BackendType, DescriptorCapacities, DescriptorSpaceKind, Format, MemoryConfig, MemoryManager,
    ResourceDescription, SamplerDescription, ViewDescription, ViewDimension, ViewKind,
};

fn dummy_manager() -> MemoryManager {
    MemoryManager::new(
        MemoryConfig::default()
            .with_backend(BackendType::Dummy)
            .with_descriptor_capacities(DescriptorCapacities::uniform(1 << 20)),
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

fn bench_allocate_release_buffer(c: &mut Criterion) {
    let mut memory = dummy_manager();
    c.bench_function("dummy_allocate_release_buffer_4k", |b| {
        b.iter(|| {
            let buffer = memory
                .allocate_buffer(&ResourceDescription::upload_buffer(4096))
                .unwrap();
            memory.release(&buffer);
            black_box(buffer);
        });
    });
}

fn bench_allocate_texture(c: &mut Criterion) {
    let mut memory = dummy_manager();
    c.bench_function("dummy_allocate_texture_256x256_mips", |b| {
        b.iter(|| {
            let texture = memory
                .allocate_texture(
                    &ResourceDescription::texture_2d(256, 256, Format::Rgba8Unorm)
                        .with_mip_levels(9),
                )
                .unwrap();
            memory.release(&texture);
            black_box(texture);
        });
    });
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

fn bench_descriptor_cache_hit(c: &mut Criterion) {
    let mut memory = dummy_manager();
    let buffers: Vec<_> = (0..64)
        .map(|_| {
            memory
                .allocate_buffer(&ResourceDescription::buffer(1024))
                .unwrap()
        })
        .collect();
    let view = ViewDescription::structured(ViewKind::ShaderResource, 0, 16, 64);
    for buffer in &buffers {
        memory.create_descriptor(buffer, &view).unwrap();
    }

    c.bench_function("descriptor_cache_hit_64_buffers", |b| {
        b.iter(|| {
            for buffer in &buffers {
                black_box(memory.create_descriptor(buffer, &view).unwrap());
            }
        });
    });
}

fn bench_constant_buffer_views(c: &mut Criterion) {
    let mut memory = dummy_manager();
    let buffer = memory
        .allocate_buffer(&ResourceDescription::upload_buffer(65536))
        .unwrap();

    c.bench_function("constant_buffer_views_256", |b| {
        b.iter(|| {
            for i in 0..256 {
                let view = ViewDescription::constant_buffer(i * 256, 256);
                black_box(memory.create_descriptor(&buffer, &view).unwrap());
            }
            memory
                .descriptors_mut()
                .reset_space(DescriptorSpaceKind::CbvSrvUav);
        });
    });
}

fn bench_texture_views(c: &mut Criterion) {
    let mut memory = dummy_manager();
    let texture = memory
        .allocate_texture(&ResourceDescription::texture_2d(64, 64, Format::Rgba8Unorm))
        .unwrap();
    let view = ViewDescription::texture_srv(Format::Rgba8Unorm, ViewDimension::Texture2D);

    c.bench_function("texture_srv_cached", |b| {
        b.iter(|| black_box(memory.create_descriptor(&texture, &view).unwrap()));
    });
}

fn bench_sampler_lookup(c: &mut Criterion) {
    let mut memory = dummy_manager();
    memory.create_sampler(&SamplerDescription::linear()).unwrap();
    memory.create_sampler(&SamplerDescription::nearest()).unwrap();

    c.bench_function("sampler_lookup", |b| {
        b.iter(|| black_box(memory.create_sampler(&SamplerDescription::linear()).unwrap()));
    });
}

// ---------------------------------------------------------------------------
// Temp buffer pool
// ---------------------------------------------------------------------------

fn bench_temp_upload_steady_state(c: &mut Criterion) {
    let mut memory = dummy_manager();
    let description = ResourceDescription::upload_buffer(16384).with_label("staging");

    c.bench_function("temp_upload_8_per_frame", |b| {
        b.iter(|| {
            for _ in 0..8 {
                black_box(memory.allocate_temp_upload(&description).unwrap());
            }
            memory.tick_frame();
        });
    });
}

criterion_group!(
    benches,
    bench_allocate_release_buffer,
    bench_allocate_texture,
    bench_descriptor_cache_hit,
    bench_constant_buffer_views,
    bench_texture_views,
    bench_sampler_lookup,
    bench_temp_upload_steady_state,
);
criterion_main!(benches);
