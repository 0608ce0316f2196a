//! Criterion benchmark untuk codec dan dispatcher
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use pitwall::protocol::{
    encode_message, CarId, CarUpdate, Command, LapCompleted, LapCompletedCar, Message, Vec3,
};
use pitwall::{Decoder, Dispatcher, Topic};

fn car_update() -> Message {
    Message::CarUpdate(CarUpdate {
        car_id: CarId(7),
        pos: Vec3 {
            x: 120.5,
            y: 3.25,
            z: -88.0,
        },
        velocity: Vec3 {
            x: 41.0,
            y: 0.0,
            z: 12.5,
        },
        gear: 5,
        engine_rpm: 7800,
        normalised_spline_pos: 0.4375,
    })
}

fn full_grid_lap() -> Message {
    Message::LapCompleted(LapCompleted {
        car_id: CarId(0),
        lap_time: 91_234,
        cuts: 0,
        cars: (0..32)
            .map(|i| LapCompletedCar {
                car_id: CarId(i),
                lap_time: 90_000 + i as u32 * 150,
                laps: 12,
                completed: 0,
            })
            .collect(),
    })
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));
    let decoder = Decoder::new();

    let update = encode_message(&car_update()).unwrap();
    group.bench_function("car_update", |b| {
        b.iter(|| decoder.decode_datagram(black_box(&update), None))
    });

    let lap = encode_message(&full_grid_lap()).unwrap();
    group.bench_function("lap_completed_32_cars", |b| {
        b.iter(|| decoder.decode_datagram(black_box(&lap), None))
    });

    let unknown = [99u8, 1, 2, 3, 4, 5, 6, 7];
    group.bench_function("unknown_tag", |b| {
        b.iter(|| decoder.decode_datagram(black_box(&unknown), None))
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    let chat = Command::send_chat(CarId(3), "Blue flag, let the leader through");
    group.bench_function("send_chat", |b| b.iter(|| black_box(&chat).encode()));

    let interval = Command::realtimepos_interval(100);
    group.bench_function("realtimepos_interval", |b| {
        b.iter(|| black_box(&interval).encode())
    });

    group.finish();
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");

    // Fan-out ke beberapa subscriber
    for subscribers in [1usize, 4, 16].iter() {
        group.throughput(Throughput::Elements(*subscribers as u64));
        group.bench_function(format!("subscribers_{}", subscribers), |b| {
            let dispatcher = Dispatcher::new();
            for _ in 0..*subscribers {
                dispatcher.subscribe(Topic::All, |msg| {
                    black_box(msg);
                    Ok(())
                });
            }
            let msg = car_update();
            b.iter(|| dispatcher.publish(black_box(&msg)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode, bench_publish);
criterion_main!(benches);
