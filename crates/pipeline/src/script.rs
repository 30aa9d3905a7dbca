use crate::prompt::ScenePrompt;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

/// Elaborates one scene prompt into `subdivisions` short script lines, one
/// per sub-clip. Pure with respect to pipeline state, which is what makes
/// the fan-out below safe.
#[async_trait]
pub trait SceneScriptGenerator: Send + Sync {
    async fn elaborate(
        &self,
        prompt: &ScenePrompt,
        previous: Option<&ScenePrompt>,
        subdivisions: usize,
    ) -> Result<Vec<String>>;
}

/// Elaborate every scene with bounded concurrency. `buffered` preserves
/// input order, so the results come back already in scene-index order for
/// the sequential consumer.
pub async fn elaborate_all(
    generator: Arc<dyn SceneScriptGenerator>,
    prompts: &[ScenePrompt],
    subdivisions: &[usize],
    worker_limit: usize,
) -> Result<Vec<Vec<String>>> {
    assert_eq!(prompts.len(), subdivisions.len());

    let jobs = prompts.iter().enumerate().map(|(index, prompt)| {
        let generator = generator.clone();
        let previous = index.checked_sub(1).map(|i| prompts[i].clone());
        let prompt = prompt.clone();
        let count = subdivisions[index];
        async move {
            let lines = generator
                .elaborate(&prompt, previous.as_ref(), count)
                .await?;
            debug!("elaborated scene {} into {} lines", index + 1, lines.len());
            Ok::<Vec<String>, anyhow::Error>(lines)
        }
    });

    stream::iter(jobs)
        .buffered(worker_limit.max(1))
        .try_collect()
        .await
}

/// Fallback elaboration when no language model is wired in: the scene's
/// visual prompt carried across every sub-clip, with a motion hint so
/// consecutive clips do not render identically.
pub struct TemplateScriptGenerator;

#[async_trait]
impl SceneScriptGenerator for TemplateScriptGenerator {
    async fn elaborate(
        &self,
        prompt: &ScenePrompt,
        _previous: Option<&ScenePrompt>,
        subdivisions: usize,
    ) -> Result<Vec<String>> {
        let mut lines = Vec::with_capacity(subdivisions);
        lines.push(prompt.visual_prompt.clone());
        for step in 1..subdivisions {
            lines.push(format!(
                "{}, the scene continues, camera movement part {}",
                prompt.visual_prompt,
                step + 1
            ));
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct SlowEcho;

    #[async_trait]
    impl SceneScriptGenerator for SlowEcho {
        async fn elaborate(
            &self,
            prompt: &ScenePrompt,
            _previous: Option<&ScenePrompt>,
            subdivisions: usize,
        ) -> Result<Vec<String>> {
            // Later scenes finish first to prove order is restored.
            let delay = 50u64.saturating_sub(prompt.narrator.len() as u64 * 10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![prompt.narrator.clone(); subdivisions])
        }
    }

    fn prompt(narrator: &str) -> ScenePrompt {
        ScenePrompt {
            narrator: narrator.to_string(),
            visual_description: String::new(),
            visual_prompt: format!("visual {narrator}"),
            scene_time_period: String::new(),
            mood: String::new(),
        }
    }

    #[tokio::test]
    async fn results_come_back_in_scene_order() {
        let prompts = vec![prompt("a"), prompt("bb"), prompt("ccc")];
        let lines = elaborate_all(Arc::new(SlowEcho), &prompts, &[1, 2, 1], 3)
            .await
            .unwrap();
        assert_eq!(lines[0], vec!["a"]);
        assert_eq!(lines[1], vec!["bb", "bb"]);
        assert_eq!(lines[2], vec!["ccc"]);
    }

    #[tokio::test]
    async fn template_generator_emits_requested_count() {
        let lines = TemplateScriptGenerator
            .elaborate(&prompt("x"), None, 4)
            .await
            .unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "visual x");
        assert!(lines[3].contains("part 4"));
    }
}
