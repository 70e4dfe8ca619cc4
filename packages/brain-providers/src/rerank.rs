use serde_json::Value;

use brain_config::ProviderConfig;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RerankHit {
	/// Position of the document in the request.
	pub index: usize,
	pub score: f32,
}

/// Reranks `docs` against `query` with a Cohere-compatible endpoint.
///
/// Returns at most `top_n` hits ordered by descending relevance.
pub async fn rerank(
	cfg: &ProviderConfig,
	query: &str,
	docs: &[String],
	top_n: usize,
) -> Result<Vec<RerankHit>> {
	if docs.is_empty() || top_n == 0 {
		return Ok(Vec::new());
	}

	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"query": query,
		"documents": docs,
		"top_n": top_n.min(docs.len()),
	});
	let request = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body);
	let mut hits = parse_rerank_response(&crate::send_json(request).await?, docs.len())?;

	hits.truncate(top_n);

	Ok(hits)
}

fn parse_rerank_response(json: &Value, doc_count: usize) -> Result<Vec<RerankHit>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(Value::as_array)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Rerank response is missing results array.".to_string(),
		})?;
	let mut hits = Vec::with_capacity(results.len());

	for item in results {
		let index = item.get("index").and_then(Value::as_u64).ok_or_else(|| {
			Error::InvalidResponse { message: "Rerank result missing index.".to_string() }
		})? as usize;
		let score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(Value::as_f64)
			.ok_or_else(|| Error::InvalidResponse {
				message: "Rerank result missing score.".to_string(),
			})? as f32;

		if index >= doc_count {
			return Err(Error::InvalidResponse {
				message: format!("Rerank result index {index} is out of range."),
			});
		}

		hits.push(RerankHit { index, score });
	}

	hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));

	Ok(hits)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn orders_hits_by_score() {
		let json = serde_json::json!({
			"results": [
				{ "index": 1, "relevance_score": 0.2 },
				{ "index": 0, "relevance_score": 0.9 },
				{ "index": 2, "relevance_score": 0.5 }
			]
		});
		let hits = parse_rerank_response(&json, 3).expect("parse failed");
		let order: Vec<usize> = hits.iter().map(|hit| hit.index).collect();

		assert_eq!(order, vec![0, 2, 1]);
	}

	#[test]
	fn rejects_out_of_range_index() {
		let json = serde_json::json!({ "results": [{ "index": 5, "relevance_score": 0.2 }] });

		assert!(parse_rerank_response(&json, 2).is_err());
	}
}
