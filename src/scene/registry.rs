//! Typed component registry backed by a Bevy ECS world

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use bevy_ecs::world::Mut;

use super::{EntityId, PointLight, Renderable, SpotLight, Transform};

/// Links an ECS entity back to the id the host assigned it
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityTag(pub EntityId);

/// Renderables and lights keyed by host entity id.
///
/// Each kind is queried on its own; callers never inspect a mixed component
/// list. Snapshots are returned in entity id order so frames are stable.
pub struct SceneRegistry {
    world: World,
    entities: HashMap<EntityId, Entity>,
}

impl Default for SceneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SceneRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRegistry")
            .field("entities", &self.entities.len())
            .finish()
    }
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            entities: HashMap::new(),
        }
    }

    /// ECS entity for `id`, spawned with a default transform on first use
    pub fn ensure_entity(&mut self, id: EntityId) -> Entity {
        if let Some(entity) = self.entities.get(&id) {
            return *entity;
        }
        let entity = self.world.spawn((EntityTag(id), Transform::default())).id();
        self.entities.insert(id, entity);
        entity
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Drop an entity and every component attached to it
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        match self.entities.remove(&id) {
            Some(entity) => self.world.despawn(entity),
            None => false,
        }
    }

    pub fn set_transform(&mut self, id: EntityId, transform: Transform) {
        let entity = self.ensure_entity(id);
        self.world.entity_mut(entity).insert(transform);
    }

    pub fn transform(&self, id: EntityId) -> Option<&Transform> {
        self.get::<Transform>(id)
    }

    pub fn transform_mut(&mut self, id: EntityId) -> Option<Mut<'_, Transform>> {
        self.get_mut::<Transform>(id)
    }

    pub fn insert_renderable(&mut self, id: EntityId, transform: Transform, renderable: Renderable) {
        let entity = self.ensure_entity(id);
        self.world.entity_mut(entity).insert((transform, renderable));
    }

    pub fn insert_point_light(&mut self, id: EntityId, transform: Transform, light: PointLight) {
        let entity = self.ensure_entity(id);
        self.world.entity_mut(entity).insert((transform, light));
    }

    pub fn insert_spot_light(&mut self, id: EntityId, transform: Transform, light: SpotLight) {
        let entity = self.ensure_entity(id);
        self.world.entity_mut(entity).insert((transform, light));
    }

    pub fn renderable(&self, id: EntityId) -> Option<&Renderable> {
        self.get::<Renderable>(id)
    }

    pub fn renderable_mut(&mut self, id: EntityId) -> Option<Mut<'_, Renderable>> {
        self.get_mut::<Renderable>(id)
    }

    pub fn point_light(&self, id: EntityId) -> Option<&PointLight> {
        self.get::<PointLight>(id)
    }

    pub fn point_light_mut(&mut self, id: EntityId) -> Option<Mut<'_, PointLight>> {
        self.get_mut::<PointLight>(id)
    }

    pub fn spot_light(&self, id: EntityId) -> Option<&SpotLight> {
        self.get::<SpotLight>(id)
    }

    pub fn spot_light_mut(&mut self, id: EntityId) -> Option<Mut<'_, SpotLight>> {
        self.get_mut::<SpotLight>(id)
    }

    /// All renderables with their transforms
    pub fn renderables(&mut self) -> Vec<(EntityId, Transform, Renderable)> {
        self.snapshot::<Renderable>()
    }

    /// All point lights with their transforms
    pub fn point_lights(&mut self) -> Vec<(EntityId, Transform, PointLight)> {
        self.snapshot::<PointLight>()
    }

    /// All spot lights with their transforms
    pub fn spot_lights(&mut self) -> Vec<(EntityId, Transform, SpotLight)> {
        self.snapshot::<SpotLight>()
    }

    /// Direct access to the ECS world
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn clear(&mut self) {
        self.world.clear_entities();
        self.entities.clear();
    }

    fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        let entity = self.entities.get(&id)?;
        self.world.get::<T>(*entity)
    }

    fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<Mut<'_, T>> {
        let entity = self.entities.get(&id)?;
        self.world.get_mut::<T>(*entity)
    }

    fn snapshot<T: Component + Clone>(&mut self) -> Vec<(EntityId, Transform, T)> {
        let mut query = self.world.query::<(&EntityTag, &Transform, &T)>();
        let mut items: Vec<_> = query
            .iter(&self.world)
            .map(|(tag, transform, component)| (tag.0, *transform, component.clone()))
            .collect();
        items.sort_by_key(|(id, _, _)| *id);
        items
    }
}
