//! # World Property Tests
//!
//! Randomized attach/detach/destroy/copy sequences checked against a plain
//! model of which components every entity should have:
//!
//! 1. **Membership**: `has` reflects the net set of attached kinds
//! 2. **Values**: every stored value survives migrations unchanged
//! 3. **Views**: a view visits exactly the matching entities, once each
//! 4. **Identity**: equal component sets share one archetype
//!
//! Run with: cargo test --test world_properties

use std::collections::{BTreeSet, HashMap};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_core::{EcsError, EntityId, EntityLocation, World, WorldConfig};

#[derive(Clone, Debug, Default, PartialEq)]
struct Health(u32);

#[derive(Clone, Debug, Default, PartialEq)]
struct Tag(String);

/// Expected state of one entity.
#[derive(Clone, Debug, Default)]
struct Model {
    int: Option<i64>,
    health: Option<u32>,
    tag: Option<String>,
}

impl Model {
    fn kinds(&self) -> usize {
        usize::from(self.int.is_some())
            + usize::from(self.health.is_some())
            + usize::from(self.tag.is_some())
    }
}

fn check(world: &World, model: &HashMap<EntityId, Model>) {
    assert_eq!(world.len(), model.len());
    for (&id, expected) in model {
        assert_eq!(world.get::<i64>(id).ok().copied(), expected.int);
        assert_eq!(world.get::<Health>(id).ok().map(|h| h.0), expected.health);
        assert_eq!(world.get::<Tag>(id).ok().map(|t| t.0.clone()), expected.tag);
        assert_eq!(world.has::<i64>(id), expected.int.is_some());

        let location = world.location(id).unwrap();
        if expected.kinds() == 0 {
            assert_eq!(location, EntityLocation::UNATTACHED);
        } else {
            let archetype = &world.archetypes().archetypes()[location.archetype.unwrap().index()];
            assert_eq!(archetype.entity_at(location.row), id);
        }
    }
    assert!(world
        .archetypes()
        .archetypes()
        .iter()
        .all(strata_core::Archetype::is_consistent));
}

fn random_walk(seed: u64, config: WorldConfig, steps: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut world = World::with_config(config);
    let mut model: HashMap<EntityId, Model> = HashMap::new();
    let mut alive: Vec<EntityId> = Vec::new();

    for step in 0..steps {
        let pick = |rng: &mut ChaCha8Rng, alive: &[EntityId]| alive[rng.gen_range(0..alive.len())];
        match rng.gen_range(0..10) {
            0 | 1 => {
                let id = world.create_entity();
                model.insert(id, Model::default());
                alive.push(id);
            }
            2 if !alive.is_empty() => {
                let id = pick(&mut rng, &alive);
                world.destroy_entity(id).unwrap();
                model.remove(&id);
                alive.retain(|&other| other != id);
            }
            3 if !alive.is_empty() => {
                let id = pick(&mut rng, &alive);
                let copy = world.copy_entity(id).unwrap();
                model.insert(copy, model[&id].clone());
                alive.push(copy);
            }
            4 | 5 if !alive.is_empty() => {
                let id = pick(&mut rng, &alive);
                let entry = model.get_mut(&id).unwrap();
                let value = step as i64;
                match entry.int {
                    Some(_) => assert!(matches!(
                        world.attach(id, (value,)),
                        Err(EcsError::ComponentAlreadyPresent { .. })
                    )),
                    None => {
                        world.attach(id, (value,)).unwrap();
                        entry.int = Some(value);
                    }
                }
            }
            6 if !alive.is_empty() => {
                let id = pick(&mut rng, &alive);
                let entry = model.get_mut(&id).unwrap();
                if entry.health.is_none() && entry.tag.is_none() {
                    let health = rng.gen_range(0..100);
                    world
                        .attach(id, (Health(health), Tag(format!("t{step}"))))
                        .unwrap();
                    entry.health = Some(health);
                    entry.tag = Some(format!("t{step}"));
                }
            }
            7 if !alive.is_empty() => {
                let id = pick(&mut rng, &alive);
                let entry = model.get_mut(&id).unwrap();
                assert_eq!(world.detach::<i64>(id).ok(), entry.int.take());
            }
            8 if !alive.is_empty() => {
                let id = pick(&mut rng, &alive);
                let entry = model.get_mut(&id).unwrap();
                assert_eq!(world.detach::<Tag>(id).ok().map(|t| t.0), entry.tag.take());
            }
            9 if !alive.is_empty() => {
                let id = pick(&mut rng, &alive);
                let entry = model.get_mut(&id).unwrap();
                if let Some(health) = entry.health.as_mut() {
                    *health += 1;
                    world.get_mut::<Health>(id).unwrap().0 += 1;
                }
            }
            _ => {}
        }
        if step % 97 == 0 {
            check(&world, &model);
        }
    }
    check(&world, &model);

    // View completeness.
    let expected: BTreeSet<EntityId> = model
        .iter()
        .filter(|(_, m)| m.int.is_some() && m.health.is_some())
        .map(|(&id, _)| id)
        .collect();
    let visited: Vec<EntityId> = world
        .view::<(EntityId, i64, Health)>()
        .into_iter()
        .map(|(id, _, _)| *id)
        .collect();
    assert_eq!(visited.len(), expected.len());
    assert_eq!(visited.into_iter().collect::<BTreeSet<_>>(), expected);

    // Archetype identity: entities with equal signatures share a table.
    let mut by_signature = HashMap::new();
    for id in world.entities() {
        let location = world.location(id).unwrap();
        let signature = world.signature_of(id).unwrap();
        let previous = by_signature.insert(signature, location.archetype);
        assert!(previous.is_none() || previous == Some(location.archetype));
    }
}

#[test]
fn random_walk_default_config() {
    for seed in 0..4 {
        random_walk(seed, WorldConfig::default(), 3000);
    }
}

#[test]
fn random_walk_compact_config() {
    random_walk(99, WorldConfig::compact(), 3000);
}

#[test]
fn random_walk_linear_probe() {
    let config = WorldConfig::from_toml_str("probe = \"linear\"\narchetype_reserve = 8").unwrap();
    random_walk(7, config, 2000);
}

#[test]
fn view_filters_compose() {
    let mut world = World::new();
    for i in 0..10i64 {
        let id = world.spawn((i,)).unwrap();
        if i % 2 == 0 {
            world.attach(id, (Health(1),)).unwrap();
        }
        if i % 5 == 0 {
            world.attach(id, (Tag("five".into()),)).unwrap();
        }
    }

    let all: i64 = world.view::<(i64,)>().into_iter().map(|(v,)| *v).sum();
    assert_eq!(all, 45);

    let with_health = world.view::<(i64,)>().include::<(Health,)>();
    assert_eq!(with_health.len(), 5);

    let healthy_untagged = world
        .view::<(i64,)>()
        .include::<(Health,)>()
        .exclude::<(Tag,)>();
    let mut values: Vec<i64> = healthy_untagged.iter().map(|(v,)| *v).collect();
    values.sort_unstable();
    assert_eq!(values, vec![2, 4, 6, 8]);

    for (health, tag) in world.view_mut::<(Health, Tag)>() {
        health.0 = 100;
        tag.0.push('!');
    }
    let boosted: Vec<u32> = world.view::<(Health, Tag)>().iter().map(|(h, _)| h.0).collect();
    assert_eq!(boosted, vec![100]);
}
